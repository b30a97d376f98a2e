//! Graph store sessions
//!
//! `GraphSession` is the single seam between the migration core and a graph
//! store. Implemented by:
//! - `EmbeddedSession`: in-process `MemoryGraph`, no network (tests, dry runs)
//! - `BoltSession`: Neo4j over the Bolt protocol
//! - `HttpSession`: Neo4j HTTP transactional endpoint

pub mod bolt;
pub mod embedded;
pub mod http;
pub mod models;

use async_trait::async_trait;
use thiserror::Error;

use crate::graph::GraphError;
use crate::statement::{Params, Statement, StatementError};

pub use bolt::BoltSession;
pub use embedded::EmbeddedSession;
pub use http::HttpSession;
pub use models::{GraphStatus, QueryResult};

/// Errors that can occur when talking to a graph store
#[derive(Error, Debug)]
pub enum SessionError {
    /// Store unreachable or rejected the connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Statement or query rejected by the store
    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Operation {operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("Invalid statement: {0}")]
    InvalidStatement(#[from] StatementError),

    #[error("Bolt error: {0}")]
    Bolt(#[from] neo4rs::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// A read query with bound parameters and the columns it returns
#[derive(Debug, Clone, PartialEq)]
pub struct CypherQuery {
    pub text: String,
    pub params: Params,
    pub columns: Vec<String>,
}

impl CypherQuery {
    pub fn new(text: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            text: text.into(),
            params: Params::new(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Unified interface to a graph store.
///
/// Every call is an independent, auto-committed unit of work: there is no
/// transaction spanning two `run` calls.
#[async_trait]
pub trait GraphSession: Send + Sync {
    /// Backend name for logs (`bolt`, `http`, `memory`)
    fn backend(&self) -> &'static str;

    /// Execute one write statement
    async fn run(&self, statement: &Statement) -> SessionResult<()>;

    /// Execute a read query and collect its rows
    async fn query(&self, query: &CypherQuery) -> SessionResult<QueryResult>;

    /// Node and relationship totals
    async fn status(&self) -> SessionResult<GraphStatus>;
}

pub(crate) const NODE_COUNT: &str = "MATCH (n) RETURN count(n) AS count";
pub(crate) const EDGE_COUNT: &str = "MATCH ()-[r]->() RETURN count(r) AS count";

/// Read a single `count` cell out of a counting query result
pub(crate) fn single_count(result: &QueryResult) -> u64 {
    result
        .records
        .first()
        .and_then(|row| row.first())
        .and_then(|cell| cell.as_u64())
        .unwrap_or(0)
}
