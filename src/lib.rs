//! Filmgraph
//!
//! Batch migration of film documents from a document store into a labeled
//! property graph, plus predefined read-only queries over both stores.
//!
//! The graph model:
//!
//! ```text
//! (:Director {name})-[:DIRECTED]->(:Film {id})
//! (:Actor {name})-[:ACTED_IN]->(:Film {id})
//! (:Film {id})-[:HAS_GENRE]->(:Genre {name})
//! ```
//!
//! Every write is a merge keyed on a uniquely constrained property, so a
//! pass can be repeated or resumed without duplicating nodes or edges.
//!
//! ## Example Usage
//!
//! ```rust
//! use filmgraph::migration::{migrate, NoProgress};
//! use filmgraph::session::EmbeddedSession;
//! use filmgraph::source::MemorySource;
//! use serde_json::json;
//!
//! # tokio_test_block(async {
//! let source = MemorySource::from_values(vec![json!({
//!     "_id": "1", "title": "X", "year": "1999",
//!     "director": "A", "actors": "B,C", "genre": "Drama"
//! })]).unwrap();
//! let session = EmbeddedSession::new();
//!
//! let report = migrate(&source, &session, None, &NoProgress).await.unwrap();
//! assert_eq!(report.succeeded, 1);
//! assert_eq!(session.graph_read().await.node_count(), 5);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod graph;
pub mod migration;
pub mod normalize;
pub mod schema;
pub mod session;
pub mod shell;
pub mod source;
pub mod statement;
pub mod upsert;

// Re-export main types for convenience
pub use config::{ConfigError, GraphBackend, GraphConfig, MigrationConfig, SourceConfig};

pub use graph::{
    Edge, EdgeId, EdgeType, GraphError, GraphResult, Label, MemoryGraph, Node, NodeId, PropertyMap,
    PropertyValue,
};

pub use normalize::{normalize, FilmAttributes, Rating};

pub use session::{
    BoltSession, CypherQuery, EmbeddedSession, GraphSession, GraphStatus, HttpSession, QueryResult,
    SessionError, SessionResult,
};

pub use source::{
    DocumentQueryExecutor, DocumentSource, JsonFileSource, MemorySource, MongoSource, SourceError,
    SourceRecord, SourceResult,
};

pub use statement::{Link, Statement};

pub use upsert::{upsert_film, UpsertError, UpsertOutcome};

pub use migration::{
    migrate, migrate_and_close, FailedRecord, Migration, MigrationError, MigrationPhase, MigrationReport, ProgressSink,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

/// Connect to the graph store selected by `config.backend`
pub async fn connect_graph(config: &GraphConfig) -> SessionResult<Box<dyn GraphSession>> {
    Ok(match config.backend {
        GraphBackend::Bolt => Box::new(BoltSession::connect(config).await?),
        GraphBackend::Http => Box::new(HttpSession::new(config)?),
        GraphBackend::Memory => Box::new(EmbeddedSession::new()),
    })
}
