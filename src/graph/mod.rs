//! Property graph model for films, people and genres
//!
//! This module provides:
//! - Typed identifiers, labels and relationship types
//! - Scalar property values shared by every graph backend
//! - `MemoryGraph`, an in-process store with merge (upsert) semantics and
//!   uniqueness constraints, backing the embedded session

pub mod edge;
pub mod node;
pub mod property;
pub mod store;
pub mod types;

pub use edge::Edge;
pub use node::Node;
pub use property::{PropertyMap, PropertyValue};
pub use store::{GraphError, GraphResult, GraphStatistics, MemoryGraph};
pub use types::{EdgeId, EdgeType, Label, NodeId};
