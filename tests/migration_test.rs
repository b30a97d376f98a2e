//! End-to-end migration passes against the embedded graph

use async_trait::async_trait;
use filmgraph::graph::{EdgeType, Label, MemoryGraph, PropertyValue};
use filmgraph::migration::{migrate, migrate_and_close, DeadLetterFile, Migration, MigrationError, MigrationPhase, NoProgress, ProgressSink};
use filmgraph::session::{CypherQuery, EmbeddedSession, GraphSession, GraphStatus, QueryResult, SessionError, SessionResult};
use filmgraph::source::{DocumentSource, JsonFileSource, MemorySource, RecordStream, SourceError, SourceRecord, SourceResult};
use filmgraph::statement::{Link, Statement};
use filmgraph::MigrationReport;
use futures::StreamExt;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

fn source(values: Vec<Value>) -> MemorySource {
    MemorySource::from_values(values).unwrap()
}

fn node_key(graph: &MemoryGraph, id: filmgraph::NodeId) -> String {
    let node = graph.get_node(id).unwrap();
    let key = node
        .get_property("id")
        .or_else(|| node.get_property("name"))
        .map(|v| v.to_string())
        .unwrap_or_default();
    format!("{}:{}", node.label, key)
}

/// Every node and edge, rendered by merge key so runs can be compared
fn snapshot(graph: &MemoryGraph) -> BTreeSet<String> {
    let mut items = BTreeSet::new();
    for label in [Label::FILM, Label::ACTOR, Label::DIRECTOR, Label::GENRE] {
        for node in graph.get_nodes_by_label(label) {
            items.insert(node_key(graph, node.id));
        }
    }
    for edge_type in [EdgeType::ACTED_IN, EdgeType::DIRECTED, EdgeType::HAS_GENRE] {
        for edge in graph.get_edges_by_type(edge_type) {
            items.insert(format!(
                "{}-[{}]->{}",
                node_key(graph, edge.source),
                edge_type,
                node_key(graph, edge.target)
            ));
        }
    }
    items
}

#[tokio::test]
async fn test_single_record_scenario() {
    let source = source(vec![json!({
        "_id": "1", "title": "X", "year": "1999",
        "director": "A", "actors": "B,C", "genre": "Drama"
    })]);
    let session = EmbeddedSession::new();

    let report = migrate(&source, &session, None, &NoProgress).await.unwrap();
    assert_eq!(report.phase, MigrationPhase::Completed);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.statements, 5);

    let graph = session.graph_read().await;
    let film = graph.find_node(Label::FILM, "id", "1").unwrap();
    assert_eq!(film.get_property("year"), Some(&PropertyValue::Integer(1999)));
    assert_eq!(film.get_property("title"), Some(&PropertyValue::from("X")));

    let director = graph.find_node(Label::DIRECTOR, "name", "A").unwrap();
    let genre = graph.find_node(Label::GENRE, "name", "Drama").unwrap();
    assert!(graph.has_edge(director.id, EdgeType::DIRECTED, film.id));
    assert!(graph.has_edge(film.id, EdgeType::HAS_GENRE, genre.id));
    for actor in ["B", "C"] {
        let actor = graph.find_node(Label::ACTOR, "name", actor).unwrap();
        assert!(graph.has_edge(actor.id, EdgeType::ACTED_IN, film.id));
    }

    let stats = graph.statistics();
    assert_eq!(stats.node_count, 5);
    assert_eq!(stats.edge_count, 4);
    assert_eq!(stats.nodes_by_label["Actor"], 2);
}

#[tokio::test]
async fn test_migration_is_idempotent() {
    let source = source(vec![
        json!({"_id": "1", "title": "Sleepless in Seattle", "director": "Nora Ephron",
               "actors": "Tom Hanks, , Meg Ryan", "genre": "Comedy,Romance"}),
        json!({"_id": "2", "title": "Cast Away", "Director": "Robert Zemeckis",
               "Actors": "Tom Hanks, Helen Hunt", "Genre": "Drama"}),
    ]);
    let session = EmbeddedSession::new();

    migrate(&source, &session, None, &NoProgress).await.unwrap();
    let first = snapshot(&*session.graph_read().await);

    migrate(&source, &session, None, &NoProgress).await.unwrap();
    let second = snapshot(&*session.graph_read().await);
    assert_eq!(first, second);

    // Merging again without the wipe converges to the same graph
    for film in ["1", "2"] {
        session.run(&Statement::merge_link(Link::Actor, film, "Tom Hanks")).await.unwrap();
    }
    assert_eq!(snapshot(&*session.graph_read().await), first);
}

#[tokio::test]
async fn test_shared_names_are_merged() {
    let source = source(vec![
        json!({"_id": "1", "director": "A", "actors": "Tom Hanks,Meg Ryan", "genre": "Drama"}),
        json!({"_id": "2", "director": "A", "actors": "Tom Hanks", "genre": "Drama,Comedy"}),
        json!({"_id": "3", "director": "B", "actors": ["Meg Ryan"], "genre": "Comedy"}),
    ]);
    let session = EmbeddedSession::new();
    migrate(&source, &session, None, &NoProgress).await.unwrap();

    let graph = session.graph_read().await;
    assert_eq!(graph.get_nodes_by_label(Label::ACTOR).len(), 2);
    assert_eq!(graph.get_nodes_by_label(Label::DIRECTOR).len(), 2);
    assert_eq!(graph.get_nodes_by_label(Label::GENRE).len(), 2);
    assert_eq!(graph.get_nodes_by_label(Label::FILM).len(), 3);

    let hanks = graph.find_node(Label::ACTOR, "name", "Tom Hanks").unwrap();
    assert_eq!(graph.get_outgoing_edges(hanks.id).len(), 2);
}

#[tokio::test]
async fn test_missing_director() {
    let source = source(vec![json!({"_id": "7", "title": "Y", "actors": "B", "genre": "Drama"})]);
    let session = EmbeddedSession::new();
    migrate(&source, &session, None, &NoProgress).await.unwrap();

    let graph = session.graph_read().await;
    assert!(graph.get_nodes_by_label(Label::DIRECTOR).is_empty());
    assert!(graph.get_edges_by_type(EdgeType::DIRECTED).is_empty());
    assert!(graph.find_node(Label::FILM, "id", "7").is_some());
    assert_eq!(graph.get_edges_by_type(EdgeType::ACTED_IN).len(), 1);
    assert_eq!(graph.get_edges_by_type(EdgeType::HAS_GENRE).len(), 1);
}

#[tokio::test]
async fn test_unparsable_year_defaults_to_zero() {
    let source = source(vec![
        json!({"_id": "1", "title": "N/A year", "year": "N/A", "Votes": "1,234"}),
        json!({"_id": "2", "title": "Fine", "year": 2010}),
    ]);
    let session = EmbeddedSession::new();
    let report = migrate(&source, &session, None, &NoProgress).await.unwrap();
    assert_eq!(report.succeeded, 2);

    let graph = session.graph_read().await;
    let film = graph.find_node(Label::FILM, "id", "1").unwrap();
    assert_eq!(film.get_property("year"), Some(&PropertyValue::Integer(0)));
    assert_eq!(film.get_property("votes"), Some(&PropertyValue::Integer(1234)));
}

/// Embedded session that fails chosen statements
struct FlakySession {
    inner: EmbeddedSession,
    fail: Box<dyn Fn(&Statement) -> bool + Send + Sync>,
}

impl FlakySession {
    fn new(fail: impl Fn(&Statement) -> bool + Send + Sync + 'static) -> Self {
        Self {
            inner: EmbeddedSession::new(),
            fail: Box::new(fail),
        }
    }
}

#[async_trait]
impl GraphSession for FlakySession {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    async fn run(&self, statement: &Statement) -> SessionResult<()> {
        if (self.fail)(statement) {
            return Err(SessionError::QueryError(format!("injected failure in {}", statement.kind())));
        }
        self.inner.run(statement).await
    }

    async fn query(&self, query: &CypherQuery) -> SessionResult<QueryResult> {
        self.inner.query(query).await
    }

    async fn status(&self) -> SessionResult<GraphStatus> {
        self.inner.status().await
    }
}

#[tokio::test]
async fn test_failed_record_does_not_stop_the_pass() {
    let session = FlakySession::new(|statement| {
        matches!(statement, Statement::MergeLink { link: Link::Actor, name, .. } if name == "Bad")
    });
    let source = source(vec![
        json!({"_id": "1", "actors": "Good", "genre": "Drama"}),
        json!({"_id": "2", "actors": "Bad, Later", "genre": "Drama"}),
        json!({"_id": "3", "actors": "Good"}),
    ]);

    let report = migrate(&source, &session, None, &NoProgress).await.unwrap();
    assert_eq!(report.phase, MigrationPhase::Completed);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].id, "2");
    assert!(report.failures[0].error.contains("merge-actor"));
    assert_eq!(report.failures[0].raw["actors"], json!("Bad, Later"));

    // Writes before the failing step stay in place
    let graph = session.inner.graph_read().await;
    let film = graph.find_node(Label::FILM, "id", "2").unwrap();
    assert_eq!(graph.get_outgoing_edges(film.id).len(), 1);
    assert!(graph.find_node(Label::ACTOR, "name", "Later").is_none());
    assert!(graph.find_node(Label::FILM, "id", "3").is_some());
}

#[tokio::test]
async fn test_wipe_failure_aborts() {
    let session = FlakySession::new(|statement| matches!(statement, Statement::DeleteAll));
    let source = source(vec![json!({"_id": "1"})]);

    let mut migration = Migration::new(&source, &session);
    let err = migration.run(&NoProgress).await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Graph {
            phase: MigrationPhase::ClearingGraph,
            ..
        }
    ));
    assert_eq!(migration.phase(), MigrationPhase::Aborted);
    assert_eq!(session.inner.graph_read().await.node_count(), 0);
}

#[tokio::test]
async fn test_constraint_failure_aborts_before_writes() {
    let session = FlakySession::new(|statement| {
        matches!(statement, Statement::CreateConstraint { label, .. } if label == "Genre")
    });
    let source = source(vec![json!({"_id": "1", "title": "X"})]);

    let mut migration = Migration::new(&source, &session);
    let err = migration.run(&NoProgress).await.unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Graph {
            phase: MigrationPhase::InitializingSchema,
            ..
        }
    ));
    assert_eq!(migration.phase(), MigrationPhase::Aborted);
    assert!(session.inner.graph_read().await.find_node(Label::FILM, "id", "1").is_none());
}

struct UnreachableSource;

#[async_trait]
impl DocumentSource for UnreachableSource {
    fn describe(&self) -> String {
        "unreachable".to_string()
    }

    async fn count(&self) -> SourceResult<u64> {
        Err(SourceError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )))
    }

    async fn stream(&self) -> SourceResult<RecordStream<'_>> {
        unreachable!("stream is never opened when count fails")
    }
}

#[tokio::test]
async fn test_unreachable_source_leaves_graph_untouched() {
    let session = EmbeddedSession::new();
    session.run(&Statement::merge_link(Link::Genre, "old", "Drama")).await.unwrap();

    let mut migration = Migration::new(&UnreachableSource, &session);
    let err = migration.run(&NoProgress).await.unwrap_err();
    assert!(matches!(err, MigrationError::Source { phase: MigrationPhase::Idle, .. }));
    assert_eq!(migration.phase(), MigrationPhase::Aborted);
    assert_eq!(session.graph_read().await.node_count(), 2);
}

/// Yields one good record, then fails on every poll like a dropped cursor
struct BrokenCursorSource;

#[async_trait]
impl DocumentSource for BrokenCursorSource {
    fn describe(&self) -> String {
        "broken cursor".to_string()
    }

    async fn count(&self) -> SourceResult<u64> {
        Ok(3)
    }

    async fn stream(&self) -> SourceResult<RecordStream<'_>> {
        let first = futures::stream::once(async {
            SourceRecord::from_value(json!({"_id": "1", "title": "X", "genre": "Drama"}))
        });
        let failing = futures::stream::repeat_with(|| {
            Err(SourceError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )))
        });
        Ok(first.chain(failing).boxed())
    }
}

#[tokio::test]
async fn test_failing_cursor_ends_the_pass() {
    let session = EmbeddedSession::new();
    let dir = tempfile::tempdir().unwrap();
    let dead_letter_path = dir.path().join("failed.jsonl");

    let report = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        migrate(&BrokenCursorSource, &session, Some(DeadLetterFile::new(&dead_letter_path)), &NoProgress),
    )
    .await
    .expect("pass terminates")
    .unwrap();

    assert_eq!(report.phase, MigrationPhase::Completed);
    assert!(!report.is_complete());
    assert!(report.interrupted.as_deref().unwrap().contains("connection reset"));
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);
    assert!(report.failures.is_empty());
    assert!(!dead_letter_path.exists());
    assert!(session.graph_read().await.find_node(Label::FILM, "id", "1").is_some());
}

/// Counts `close` calls on the wrapped source
struct ClosingSource<S> {
    inner: S,
    closed: AtomicUsize,
}

impl<S> ClosingSource<S> {
    fn new(inner: S) -> Self {
        Self {
            inner,
            closed: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<S: DocumentSource> DocumentSource for ClosingSource<S> {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    async fn count(&self) -> SourceResult<u64> {
        self.inner.count().await
    }

    async fn stream(&self) -> SourceResult<RecordStream<'_>> {
        self.inner.stream().await
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_source_is_closed_after_an_aborted_pass() {
    let source = ClosingSource::new(UnreachableSource);
    let session = EmbeddedSession::new();

    let err = migrate_and_close(&source, &session, None, &NoProgress).await.unwrap_err();
    assert!(matches!(err, MigrationError::Source { .. }));
    assert_eq!(source.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_source_is_closed_after_a_completed_pass() {
    let source = ClosingSource::new(source(vec![json!({"_id": "1", "title": "X"})]));
    let session = EmbeddedSession::new();

    let report = migrate_and_close(&source, &session, None, &NoProgress).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(source.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_migration_runs_once() {
    let source = source(vec![]);
    let session = EmbeddedSession::new();
    let mut migration = Migration::new(&source, &session);

    let report = migration.run(&NoProgress).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.processed(), 0);

    let err = migration.run(&NoProgress).await.unwrap_err();
    assert!(matches!(err, MigrationError::InvalidTransition { .. }));
}

#[tokio::test]
async fn test_unreadable_lines_are_counted_and_dead_lettered() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"_id": "1", "title": "X", "actors": "B"}}"#).unwrap();
    writeln!(file, "{{not json").unwrap();
    writeln!(file, r#"{{"_id": "3", "title": "Z"}}"#).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let dead_letter_path = dir.path().join("failed.jsonl");

    let source = JsonFileSource::new(file.path());
    let session = EmbeddedSession::new();
    let report = migrate(&source, &session, Some(DeadLetterFile::new(&dead_letter_path)), &NoProgress)
        .await
        .unwrap();

    assert_eq!(report.expected, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].id, "");
    assert_eq!(report.failures[0].raw, Value::Null);

    let lines: Vec<Value> = std::fs::read_to_string(&dead_letter_path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["id"], json!(""));
    assert!(lines[0]["error"].as_str().unwrap().contains("Malformed"));
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingProgress {
    fn start(&self, total: u64) {
        self.events.lock().unwrap().push(format!("start {}", total));
    }

    fn record(&self, id: &str, succeeded: bool) {
        self.events.lock().unwrap().push(format!("{} {}", id, succeeded));
    }

    fn finish(&self, report: &MigrationReport) {
        self.events.lock().unwrap().push(format!("finish {}", report.phase));
    }
}

#[tokio::test]
async fn test_progress_events() {
    let session = FlakySession::new(|statement| matches!(statement, Statement::UpsertFilm(film) if film.id == "2"));
    let source = source(vec![json!({"_id": "1"}), json!({"_id": "2"})]);
    let progress = RecordingProgress::default();

    migrate(&source, &session, None, &progress).await.unwrap();
    let events = progress.events.lock().unwrap();
    assert_eq!(
        *events,
        vec!["start 2", "1 true", "2 false", "finish completed"]
    );
}
