//! Interactive shell over the predefined query catalogs
//!
//! The shell accepts a fixed set of verbs and only ever executes catalog
//! entries; query text typed by the user is never sent to either store.
//!
//! ```text
//! help
//! list [graph|docs]
//! describe <query>
//! run <query> [key=value ...]
//! status
//! quit | exit
//! ```

use thiserror::Error;

use crate::catalog::{self, cypher, document, CatalogError, EntryInfo, Store};
use crate::session::{GraphSession, GraphStatus, QueryResult, SessionError};
use crate::source::{DocumentQueryExecutor, SourceError};

#[derive(Error, Debug)]
pub enum ShellError {
    #[error("Unknown command {0:?}; type `help` for the list of commands")]
    UnknownCommand(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("{0}")]
    Catalog(#[from] CatalogError),

    #[error("The {0} store is not connected")]
    NotConnected(&'static str),

    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{0}")]
    Source(#[from] SourceError),
}

pub type ShellResult<T> = Result<T, ShellError>;

/// A parsed shell command
#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Help,
    List(Option<Store>),
    Describe(String),
    Run { name: String, args: Vec<(String, String)> },
    Status,
    Quit,
}

/// What a command produced
#[derive(Debug, Clone, PartialEq)]
pub enum ShellOutput {
    Message(String),
    Entries(Vec<EntryInfo>),
    Table(QueryResult),
    Status(GraphStatus),
    Quit,
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> ShellResult<Option<ShellCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = line.split_whitespace();
    let verb = tokens.next().unwrap_or_default().to_ascii_lowercase();
    let rest: Vec<&str> = tokens.collect();

    let command = match verb.as_str() {
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" => ShellCommand::Quit,
        "status" => ShellCommand::Status,
        "list" | "ls" => match rest.as_slice() {
            [] => ShellCommand::List(None),
            ["graph"] => ShellCommand::List(Some(Store::Graph)),
            ["docs"] => ShellCommand::List(Some(Store::Documents)),
            _ => return Err(ShellError::Usage("list [graph|docs]")),
        },
        "describe" => match rest.as_slice() {
            [name] => ShellCommand::Describe(name.to_string()),
            _ => return Err(ShellError::Usage("describe <query>")),
        },
        "run" => match rest.split_first() {
            Some((name, args)) => ShellCommand::Run {
                name: name.to_string(),
                args: join_arguments(args)?,
            },
            None => return Err(ShellError::Usage("run <query> [key=value ...]")),
        },
        _ => return Err(ShellError::UnknownCommand(verb)),
    };
    Ok(Some(command))
}

/// Group whitespace-split tokens into `key=value` pairs, so that
/// `actorName=Tom Hanks` keeps its space. Surrounding quotes are removed.
fn join_arguments(tokens: &[&str]) -> ShellResult<Vec<(String, String)>> {
    let mut raw: Vec<String> = Vec::new();
    for token in tokens {
        match raw.last_mut() {
            Some(last) if !token.contains('=') => {
                last.push(' ');
                last.push_str(token);
            }
            _ => raw.push(token.to_string()),
        }
    }

    let mut args = catalog::parse_arguments(&raw)?;
    for (_, value) in args.iter_mut() {
        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                *value = value[1..value.len() - 1].to_string();
            }
        }
    }
    Ok(args)
}

pub fn help_text() -> String {
    [
        "Commands:",
        "  help                          Show this help",
        "  list [graph|docs]             List predefined queries",
        "  describe <query>              Show a query and its parameters",
        "  run <query> [key=value ...]   Run a predefined query",
        "  status                        Show graph node and relationship counts",
        "  quit | exit                   Leave the shell",
    ]
    .join("\n")
}

/// Multi-line description of a catalog entry
pub fn describe_entry(entry: &EntryInfo) -> String {
    let mut text = format!("{} [{}]\n  {}", entry.name, entry.store.as_str(), entry.description);
    if entry.params.is_empty() {
        text.push_str("\n  (no parameters)");
    }
    for param in entry.params {
        text.push_str(&format!("\n  {}=<{}>", param.name, param.description));
    }
    if let Some(query) = cypher::find(entry.name) {
        text.push_str(&format!("\n\n{}", query.cypher));
    }
    text
}

/// Executes shell commands against whichever stores are connected
pub struct Shell<'a> {
    graph: Option<&'a dyn GraphSession>,
    documents: Option<&'a dyn DocumentQueryExecutor>,
    find_limit: Option<i64>,
}

impl<'a> Shell<'a> {
    pub fn new(graph: Option<&'a dyn GraphSession>, documents: Option<&'a dyn DocumentQueryExecutor>) -> Self {
        Self {
            graph,
            documents,
            find_limit: None,
        }
    }

    /// Row limit applied to document `find` queries
    pub fn with_find_limit(mut self, limit: Option<i64>) -> Self {
        self.find_limit = limit;
        self
    }

    pub async fn execute(&self, command: ShellCommand) -> ShellResult<ShellOutput> {
        match command {
            ShellCommand::Help => Ok(ShellOutput::Message(help_text())),
            ShellCommand::Quit => Ok(ShellOutput::Quit),
            ShellCommand::List(store) => Ok(ShellOutput::Entries(
                catalog::entries()
                    .into_iter()
                    .filter(|e| store.map_or(true, |s| e.store == s))
                    .collect(),
            )),
            ShellCommand::Describe(name) => Ok(ShellOutput::Message(describe_entry(&catalog::lookup(&name)?))),
            ShellCommand::Status => {
                let graph = self.graph.ok_or(ShellError::NotConnected("graph"))?;
                Ok(ShellOutput::Status(graph.status().await?))
            }
            ShellCommand::Run { name, args } => Ok(ShellOutput::Table(self.run_query(&name, &args).await?)),
        }
    }

    /// Bind and run a catalog entry by name
    pub async fn run_query(&self, name: &str, args: &[(String, String)]) -> ShellResult<QueryResult> {
        if let Some(query) = cypher::find(name) {
            let prepared = query.prepare(args)?;
            let graph = self.graph.ok_or(ShellError::NotConnected("graph"))?;
            return Ok(graph.query(&prepared).await?);
        }
        if let Some(query) = document::find(name) {
            let op = query.prepare(args)?;
            let documents = self.documents.ok_or(ShellError::NotConnected("document"))?;
            return Ok(documents.execute(&op, self.find_limit).await?);
        }
        Err(CatalogError::UnknownQuery(name.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DocumentOp;
    use crate::session::EmbeddedSession;
    use crate::source::SourceResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<(DocumentOp, Option<i64>)>>,
    }

    #[async_trait]
    impl DocumentQueryExecutor for RecordingExecutor {
        async fn execute(&self, op: &DocumentOp, limit: Option<i64>) -> SourceResult<QueryResult> {
            self.calls.lock().unwrap().push((op.clone(), limit));
            let mut result = QueryResult::new(vec!["count".to_string()]);
            result.records.push(vec![serde_json::json!(42)]);
            Ok(result)
        }
    }

    #[test]
    fn test_parse_verbs() {
        assert_eq!(parse_command("  ").unwrap(), None);
        assert_eq!(parse_command("HELP").unwrap(), Some(ShellCommand::Help));
        assert_eq!(parse_command("exit").unwrap(), Some(ShellCommand::Quit));
        assert_eq!(
            parse_command("list docs").unwrap(),
            Some(ShellCommand::List(Some(Store::Documents)))
        );
        assert_eq!(
            parse_command("describe actor_most_films").unwrap(),
            Some(ShellCommand::Describe("actor_most_films".to_string()))
        );
    }

    #[test]
    fn test_parse_run_arguments() {
        let command = parse_command("run shortest_path_between_actors actorName1=Tom Hanks actorName2=\"Meg Ryan\"")
            .unwrap()
            .unwrap();
        assert_eq!(
            command,
            ShellCommand::Run {
                name: "shortest_path_between_actors".to_string(),
                args: vec![
                    ("actorName1".to_string(), "Tom Hanks".to_string()),
                    ("actorName2".to_string(), "Meg Ryan".to_string()),
                ],
            }
        );
    }

    #[test]
    fn test_free_form_queries_are_rejected() {
        let err = parse_command("MATCH (n) DETACH DELETE n").unwrap_err();
        assert!(matches!(err, ShellError::UnknownCommand(_)));
        assert!(matches!(parse_command("run q oops").unwrap_err(), ShellError::Catalog(_)));
        assert!(matches!(parse_command("list everything").unwrap_err(), ShellError::Usage(_)));
    }

    #[tokio::test]
    async fn test_run_document_query() {
        let executor = RecordingExecutor::default();
        let shell = Shell::new(None, Some(&executor)).with_find_limit(Some(5));

        let result = shell.run_query("films_after_1999", &[]).await.unwrap();
        assert_eq!(result.records[0][0], serde_json::json!(42));

        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.kind(), "count");
        assert_eq!(calls[0].1, Some(5));
    }

    #[tokio::test]
    async fn test_missing_store() {
        let shell = Shell::new(None, None);
        let err = shell.run_query("actor_most_films", &[]).await.unwrap_err();
        assert!(matches!(err, ShellError::NotConnected("graph")));

        let err = shell.run_query("no_such_query", &[]).await.unwrap_err();
        assert!(matches!(err, ShellError::Catalog(CatalogError::UnknownQuery(_))));
    }

    #[tokio::test]
    async fn test_execute_status_and_list() {
        let session = EmbeddedSession::new();
        let shell = Shell::new(Some(&session), None);

        let ShellOutput::Status(status) = shell.execute(ShellCommand::Status).await.unwrap() else {
            panic!("expected status");
        };
        assert_eq!(status.nodes, 0);

        let ShellOutput::Entries(entries) = shell.execute(ShellCommand::List(Some(Store::Graph))).await.unwrap() else {
            panic!("expected entries");
        };
        assert!(entries.iter().all(|e| e.store == Store::Graph));
        assert!(!entries.is_empty());

        let output = shell.execute(ShellCommand::Quit).await.unwrap();
        assert_eq!(output, ShellOutput::Quit);
    }
}
