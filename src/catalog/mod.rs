//! Predefined query catalogs
//!
//! Two fixed sets of named queries: Cypher for the graph store and
//! aggregation pipelines for the document store. Queries are data, not
//! code: parameters are declared per entry and bound as typed driver
//! parameters, never spliced into query text.

pub mod cypher;
pub mod document;

use indexmap::IndexMap;
use thiserror::Error;

use crate::graph::PropertyValue;

pub use cypher::{GraphQuery, GRAPH_QUERIES};
pub use document::{DocumentOp, DocumentQuery, DOCUMENT_QUERIES};

#[derive(Error, Debug, PartialEq)]
pub enum CatalogError {
    #[error("Unknown query: {0}")]
    UnknownQuery(String),

    #[error("Query {query} requires parameter {param}")]
    MissingParameter { query: String, param: String },

    #[error("Query {query} does not accept parameter {param}")]
    UnexpectedParameter { query: String, param: String },

    #[error("Malformed argument {0:?}: expected key=value")]
    MalformedArgument(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Bound parameter values, keyed by parameter name
pub type Bindings = IndexMap<String, PropertyValue>;

/// A declared query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
}

/// Which store a catalog entry runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    Graph,
    Documents,
}

impl Store {
    pub fn as_str(&self) -> &'static str {
        match self {
            Store::Graph => "graph",
            Store::Documents => "docs",
        }
    }
}

/// Name, description and parameters of any catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    pub store: Store,
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

/// Every entry of both catalogs, graph queries first
pub fn entries() -> Vec<EntryInfo> {
    GRAPH_QUERIES
        .iter()
        .map(GraphQuery::info)
        .chain(DOCUMENT_QUERIES.iter().map(DocumentQuery::info))
        .collect()
}

/// Find an entry by name in either catalog
pub fn lookup(name: &str) -> CatalogResult<EntryInfo> {
    entries()
        .into_iter()
        .find(|e| e.name == name)
        .ok_or_else(|| CatalogError::UnknownQuery(name.to_string()))
}

/// Parse `key=value` arguments, keeping their order
pub fn parse_arguments<S: AsRef<str>>(args: &[S]) -> CatalogResult<Vec<(String, String)>> {
    args.iter()
        .map(|arg| {
            let arg = arg.as_ref();
            match arg.split_once('=') {
                Some((key, value)) if !key.trim().is_empty() => {
                    Ok((key.trim().to_string(), value.trim().to_string()))
                }
                _ => Err(CatalogError::MalformedArgument(arg.to_string())),
            }
        })
        .collect()
}

/// Check supplied arguments against the declared parameters.
///
/// Every declared parameter must be supplied exactly; unknown names are
/// rejected rather than ignored.
pub fn bind(query: &str, specs: &[ParamSpec], args: &[(String, String)]) -> CatalogResult<Bindings> {
    if let Some((key, _)) = args.iter().find(|(key, _)| !specs.iter().any(|s| s.name == key)) {
        return Err(CatalogError::UnexpectedParameter {
            query: query.to_string(),
            param: key.clone(),
        });
    }

    let mut bindings = Bindings::new();
    for spec in specs {
        let value = args
            .iter()
            .rev()
            .find(|(key, _)| key == spec.name)
            .map(|(_, value)| value.clone())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CatalogError::MissingParameter {
                query: query.to_string(),
                param: spec.name.to_string(),
            })?;
        bindings.insert(spec.name.to_string(), PropertyValue::String(value));
    }
    Ok(bindings)
}
