//! Filmgraph CLI: run migrations and the predefined query catalogs
//!
//! Connection settings come from the environment (and `.env`), the same way
//! the `filmgraph-migrate` batch binary reads them.

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use filmgraph::catalog::{self, EntryInfo, Store};
use filmgraph::migration::{migrate_and_close, BarProgress, DeadLetterFile, MigrationReport, NoProgress, ProgressSink};
use filmgraph::shell::{parse_command, Shell, ShellOutput};
use filmgraph::{
    DocumentQueryExecutor, DocumentSource, GraphBackend, GraphSession, GraphStatus, JsonFileSource,
    MigrationConfig, MongoSource, QueryResult,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "filmgraph-cli", version, about = "Film graph migration and query CLI")]
struct Cli {
    /// Graph backend: bolt, http or memory (overrides GRAPH_BACKEND)
    #[arg(long, global = true)]
    backend: Option<GraphBackend>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum StoreArg {
    Graph,
    Docs,
}

impl From<StoreArg> for Store {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Graph => Store::Graph,
            StoreArg::Docs => Store::Documents,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List predefined queries
    List {
        /// Only list queries for one store
        #[arg(value_enum)]
        store: Option<StoreArg>,
    },
    /// Show a predefined query and its parameters
    Describe {
        name: String,
    },
    /// Run a predefined query
    Query {
        /// Query name, see `filmgraph-cli list`
        name: String,

        /// Parameters as key=value
        args: Vec<String>,

        /// Row limit for document find queries
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Show graph node and relationship counts
    Status,
    /// Start an interactive shell over the query catalogs
    Shell {
        /// Row limit for document find queries
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Copy every source document into the graph
    Migrate {
        /// Read a JSON or JSON-lines export instead of MongoDB
        #[arg(long, env = "SOURCE_FILE")]
        file: Option<PathBuf>,

        /// Append failed records to this JSON-lines file
        #[arg(long, env = "DEAD_LETTER_FILE")]
        dead_letter: Option<PathBuf>,

        /// Hide the progress bar
        #[arg(long)]
        quiet: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = MigrationConfig::load().context("loading configuration")?;
    if let Some(backend) = cli.backend {
        config.graph.backend = backend;
    }
    let format = cli.format;

    match cli.command {
        Commands::List { store } => {
            let store = store.map(Store::from);
            let entries: Vec<EntryInfo> = catalog::entries()
                .into_iter()
                .filter(|e| store.map_or(true, |s| e.store == s))
                .collect();
            print_entries(&entries, format)
        }
        Commands::Describe { name } => {
            let entry = catalog::lookup(&name)?;
            println!("{}", filmgraph::shell::describe_entry(&entry));
            Ok(())
        }
        Commands::Query { name, args, limit } => {
            let entry = catalog::lookup(&name)?;
            let args = catalog::parse_arguments(&args)?;
            let (graph, documents) = match entry.store {
                Store::Graph => (Some(connect_graph(&config).await?), None),
                Store::Documents => (None, Some(connect_documents(&config).await?)),
            };
            let shell = Shell::new(
                graph.as_deref(),
                documents.as_ref().map(|d| d as &dyn DocumentQueryExecutor),
            )
            .with_find_limit(limit);
            let result = shell.run_query(&name, &args).await?;
            print_result(&result, format)
        }
        Commands::Status => {
            let graph = connect_graph(&config).await?;
            print_status(&graph.status().await?, format)
        }
        Commands::Shell { limit } => run_shell(&config, limit, format).await,
        Commands::Migrate {
            file,
            dead_letter,
            quiet,
        } => {
            if file.is_some() {
                config.source.file = file;
            }
            if dead_letter.is_some() {
                config.dead_letter_file = dead_letter;
            }
            run_migrate(&config, quiet, format).await
        }
    }
}

async fn connect_graph(config: &MigrationConfig) -> anyhow::Result<Box<dyn GraphSession>> {
    filmgraph::connect_graph(&config.graph)
        .await
        .with_context(|| format!("connecting to graph store at {}", config.graph.uri))
}

async fn connect_documents(config: &MigrationConfig) -> anyhow::Result<MongoSource> {
    MongoSource::connect(&config.source)
        .await
        .with_context(|| format!("connecting to document store at {}", config.source.uri))
}

async fn run_migrate(config: &MigrationConfig, quiet: bool, format: OutputFormat) -> anyhow::Result<()> {
    let graph = connect_graph(config).await?;
    let mongo = match config.source.file {
        Some(_) => None,
        None => Some(connect_documents(config).await?),
    };
    let file = config.source.file.as_ref().map(JsonFileSource::new);
    let source: &dyn DocumentSource = match (&file, &mongo) {
        (Some(file), _) => file,
        (None, Some(mongo)) => mongo,
        (None, None) => anyhow::bail!("no document source configured"),
    };

    let bar;
    let progress: &dyn ProgressSink = if quiet {
        &NoProgress
    } else {
        bar = BarProgress::new();
        &bar
    };

    let dead_letter = config.dead_letter_file.as_ref().map(DeadLetterFile::new);
    let report = migrate_and_close(source, graph.as_ref(), dead_letter, progress).await?;
    print_report(&report, format)

}

async fn run_shell(config: &MigrationConfig, limit: Option<i64>, format: OutputFormat) -> anyhow::Result<()> {
    // The shell stays usable when only one store is reachable
    let graph = match connect_graph(config).await {
        Ok(graph) => Some(graph),
        Err(e) => {
            eprintln!("Warning: graph queries unavailable: {:#}", e);
            None
        }
    };
    let documents = match connect_documents(config).await {
        Ok(documents) => Some(documents),
        Err(e) => {
            eprintln!("Warning: document queries unavailable: {:#}", e);
            None
        }
    };
    let shell = Shell::new(
        graph.as_deref(),
        documents.as_ref().map(|d| d as &dyn DocumentQueryExecutor),
    )
    .with_find_limit(limit);

    println!("Filmgraph Interactive Shell");
    println!("Type `help` for commands, `quit` to exit.\n");

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        eprint!("filmgraph> ");

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("Error: {}", e);
                continue;
            }
        };

        let rendered = match shell.execute(command).await {
            Ok(ShellOutput::Quit) => break,
            Ok(ShellOutput::Message(text)) => {
                println!("{}", text);
                Ok(())
            }
            Ok(ShellOutput::Entries(entries)) => print_entries(&entries, format),
            Ok(ShellOutput::Table(result)) => print_result(&result, format),
            Ok(ShellOutput::Status(status)) => print_status(&status, format),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = rendered {
            eprintln!("Error: {:#}", e);
        }
    }

    println!("Bye!");
    if let Some(documents) = documents {
        documents.close().await;
    }
    Ok(())
}

fn print_result(result: &QueryResult, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Csv => {
            if !result.columns.is_empty() {
                print!("{}", render_csv(result)?);
            }
        }
        OutputFormat::Table => {
            if result.columns.is_empty() {
                println!("(no results)");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(&result.columns);

            for row in &result.records {
                let cells: Vec<String> = row.iter().map(format_table_value).collect();
                table.add_row(cells);
            }

            println!("{}", table);
            println!("{} row(s)", result.records.len());
        }
    }

    Ok(())
}

fn print_entries(entries: &[EntryInfo], format: OutputFormat) -> anyhow::Result<()> {
    let mut result = QueryResult::new(vec![
        "store".to_string(),
        "name".to_string(),
        "description".to_string(),
        "parameters".to_string(),
    ]);
    for entry in entries {
        let params: Vec<&str> = entry.params.iter().map(|p| p.name).collect();
        result.records.push(vec![
            entry.store.as_str().into(),
            entry.name.into(),
            entry.description.into(),
            params.join(", ").into(),
        ]);
    }
    print_result(&result, format)
}

fn print_status(status: &GraphStatus, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(status)?);
        }
        _ => {
            println!("Backend: {}", status.backend);
            println!("Nodes:   {}", status.nodes);
            println!("Edges:   {}", status.edges);
        }
    }

    Ok(())
}

fn print_report(report: &MigrationReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        _ => {
            println!("Run:      {}", report.run_id);
            println!("Phase:    {}", report.phase);
            println!("Migrated: {}", report.succeeded);
            println!("Failed:   {}", report.failed);
            println!("Elapsed:  {}ms", report.elapsed().num_milliseconds());
            if let Some(error) = &report.interrupted {
                println!("Stopped:  source read failed: {}", error);
            }
            for failure in report.failures.iter().take(10) {
                println!("  {:?}: {}", failure.id, failure.error);
            }
            if report.failures.len() > 10 {
                println!("  ... and {} more", report.failures.len() - 10);
            }
        }
    }

    Ok(())
}

fn format_table_value(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Array(items) if items.iter().all(|i| i.is_string()) => items
            .iter()
            .filter_map(|i| i.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        _ => serde_json::to_string(v).unwrap_or_default(),
    }
}

/// Render a result as CSV. Name lists (co-stars, actor paths) become a
/// single `; `-joined cell; nested documents stay JSON.
fn render_csv(result: &QueryResult) -> anyhow::Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    writer.write_record(&result.columns)?;
    for row in &result.records {
        writer.write_record(row.iter().map(csv_cell))?;
    }
    Ok(String::from_utf8(writer.into_inner()?)?)
}

fn csv_cell(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) if items.iter().all(|i| i.is_string()) => items
            .iter()
            .filter_map(|i| i.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => serde_json::to_string(v).unwrap_or_default(),
    }
}
