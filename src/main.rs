use anyhow::Context;
use filmgraph::config::MigrationConfig;
use filmgraph::migration::{migrate_and_close, BarProgress, DeadLetterFile};
use filmgraph::source::{DocumentSource, JsonFileSource, MongoSource};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    println!("Filmgraph migration v{}", filmgraph::version());
    println!("==========================================");

    match run().await {
        Ok(()) => println!("✅ Migration completed"),
        Err(e) => {
            eprintln!("❌ Migration failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = MigrationConfig::load().context("loading configuration")?;

    let session = filmgraph::connect_graph(&config.graph)
        .await
        .with_context(|| format!("connecting to graph store at {}", config.graph.uri))?;

    let mongo = match config.source.file {
        Some(_) => None,
        None => Some(
            MongoSource::connect(&config.source)
                .await
                .with_context(|| format!("connecting to document store at {}", config.source.uri))?,
        ),
    };
    let file = config.source.file.as_ref().map(JsonFileSource::new);
    let source: &dyn DocumentSource = match (&file, &mongo) {
        (Some(file), _) => file,
        (None, Some(mongo)) => mongo,
        (None, None) => anyhow::bail!("no document source configured"),
    };

    println!("Source: {}", source.describe());
    println!("Target: {} graph", session.backend());
    println!();

    let dead_letter = config.dead_letter_file.as_ref().map(DeadLetterFile::new);
    let progress = BarProgress::new();
    let report = migrate_and_close(source, session.as_ref(), dead_letter, &progress).await?;

    println!();
    println!("Run:       {}", report.run_id);
    println!("Migrated:  {}", report.succeeded);
    println!("Failed:    {}", report.failed);
    println!("Elapsed:   {}ms", report.elapsed().num_milliseconds());
    if let Some(error) = &report.interrupted {
        println!("Stopped:   source read failed: {}", error);
    }
    if let Some(path) = &config.dead_letter_file {
        if report.failed > 0 {
            println!("Failed records written to {}", path.display());
        }
    }

    if let Ok(status) = session.status().await {
        println!("Graph:     {} nodes, {} relationships", status.nodes, status.edges);
    }
    Ok(())
}
