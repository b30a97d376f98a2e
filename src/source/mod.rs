//! Document sources
//!
//! A `DocumentSource` exposes a finite, restartable sequence of raw film
//! documents: every call to [`DocumentSource::stream`] starts again from the
//! first record in natural storage order, and [`DocumentSource::count`]
//! reports the total up front for progress reporting.

pub mod json;
pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::catalog::DocumentOp;
use crate::session::QueryResult;

pub use json::JsonFileSource;
pub use memory::MemorySource;
pub use mongo::MongoSource;

/// Errors raised while reading source documents
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Document store error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Record is not an object: {0}")]
    NotAnObject(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

impl SourceError {
    /// Whether the error concerns a single malformed record.
    ///
    /// Other errors come from the store or the file system, and a cursor that
    /// raised one cannot be trusted to yield anything further.
    pub fn is_record_error(&self) -> bool {
        matches!(self, SourceError::Parse(_) | SourceError::NotAnObject(_))
    }
}

/// Stream of records produced by a single pass over a source
pub type RecordStream<'a> = BoxStream<'a, SourceResult<SourceRecord>>;

/// One raw film document, with keys in their stored order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRecord(Map<String, Value>);

impl SourceRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        SourceRecord(fields)
    }

    /// Wrap a JSON value, which must be an object
    pub fn from_value(value: Value) -> SourceResult<Self> {
        match value {
            Value::Object(fields) => Ok(SourceRecord(fields)),
            other => Err(SourceError::NotAnObject(truncate(&other.to_string(), 80))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Compact JSON rendering, used when logging failed records
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }
}

/// A finite, restartable collection of film documents
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Human-readable description for logs (e.g. `films.movies`)
    fn describe(&self) -> String;

    /// Total number of records a full pass will yield
    async fn count(&self) -> SourceResult<u64>;

    /// Start a fresh pass from the first record
    async fn stream(&self) -> SourceResult<RecordStream<'_>>;

    /// Release any connections held by the source
    async fn close(&self) {}
}

/// Executes predefined document catalog operations
#[async_trait]
pub trait DocumentQueryExecutor: Send + Sync {
    /// Run `op`; `limit` overrides the row limit of `find` operations
    async fn execute(&self, op: &DocumentOp, limit: Option<i64>) -> SourceResult<QueryResult>;
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
