//! In-memory graph storage with merge semantics
//!
//! `MemoryGraph` mirrors the subset of a graph database that the migration
//! relies on: uniqueness constraints on (label, property) pairs, keyed node
//! merges, and relationship merges that never duplicate a
//! (source, type, target) triple.

use super::edge::Edge;
use super::node::Node;
use super::property::PropertyMap;
use super::types::{EdgeId, EdgeType, Label, NodeId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur during graph operations
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Key of the merge index: (label, property, key value)
type MergeKey = (Label, String, String);

/// Node and edge counts, broken down by label and relationship type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes_by_label: BTreeMap<String, usize>,
    pub edges_by_type: BTreeMap<String, usize>,
}

/// In-memory labeled property graph
#[derive(Debug, Default)]
pub struct MemoryGraph {
    nodes: FxHashMap<NodeId, Node>,
    edges: FxHashMap<EdgeId, Edge>,

    /// Label index for fast lookups
    label_index: HashMap<Label, HashSet<NodeId>>,

    /// (label, property, value) -> node, for every node carrying a merge key
    merge_index: FxHashMap<MergeKey, NodeId>,

    /// (source, type, target) triples already present
    edge_index: FxHashSet<(NodeId, EdgeType, NodeId)>,

    /// Declared uniqueness constraints
    constraints: HashSet<(Label, String)>,

    next_node_id: u64,
    next_edge_id: u64,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            next_node_id: 1,
            next_edge_id: 1,
            ..Default::default()
        }
    }

    /// Declare a uniqueness constraint. Returns `false` if it already existed.
    pub fn create_constraint(&mut self, label: impl Into<Label>, property: impl Into<String>) -> bool {
        self.constraints.insert((label.into(), property.into()))
    }

    pub fn has_constraint(&self, label: &str, property: &str) -> bool {
        self.is_constrained(&Label::new(label), property)
    }

    fn is_constrained(&self, label: &Label, property: &str) -> bool {
        self.constraints.contains(&(label.clone(), property.to_string()))
    }

    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Match the node with `label` whose `property` equals `value`, or create it.
    ///
    /// Merging on a key with no declared constraint still matches by value,
    /// but is logged: without the constraint a real graph store would scan
    /// every node of the label and could hold duplicates.
    pub fn merge_node(&mut self, label: &str, property: &str, value: &str) -> NodeId {
        let key = (Label::new(label), property.to_string(), value.to_string());
        if let Some(id) = self.merge_index.get(&key) {
            return *id;
        }
        if !self.is_constrained(&key.0, property) {
            warn!("Merging {}.{} without a uniqueness constraint", label, property);
        }

        let id = self.allocate_node(Label::new(label));
        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_property(property, value);
        }
        self.merge_index.insert(key, id);
        id
    }

    /// Overwrite properties on an existing node (last write wins)
    pub fn set_properties(&mut self, id: NodeId, properties: PropertyMap) -> GraphResult<()> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))?;
        for (key, value) in properties {
            node.set_property(key, value);
        }
        Ok(())
    }

    /// Create the edge unless the same (source, type, target) triple exists.
    /// Returns `true` when a new edge was created.
    pub fn merge_edge(&mut self, source: NodeId, edge_type: &str, target: NodeId) -> GraphResult<bool> {
        if !self.nodes.contains_key(&source) {
            return Err(GraphError::NodeNotFound(source));
        }
        if !self.nodes.contains_key(&target) {
            return Err(GraphError::NodeNotFound(target));
        }

        let edge_type = EdgeType::new(edge_type);
        if !self.edge_index.insert((source, edge_type.clone(), target)) {
            return Ok(false);
        }

        let id = EdgeId(self.next_edge_id);
        self.next_edge_id += 1;
        self.edges.insert(id, Edge::new(id, source, target, edge_type));
        Ok(true)
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Look up a node by its merge key
    pub fn find_node(&self, label: &str, property: &str, value: &str) -> Option<&Node> {
        let key = (Label::new(label), property.to_string(), value.to_string());
        self.merge_index.get(&key).and_then(|id| self.nodes.get(id))
    }

    pub fn get_nodes_by_label(&self, label: &str) -> Vec<&Node> {
        self.label_index
            .get(&Label::new(label))
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn get_edges_by_type(&self, edge_type: &str) -> Vec<&Edge> {
        self.edges
            .values()
            .filter(|e| e.edge_type.as_str() == edge_type)
            .collect()
    }

    pub fn get_outgoing_edges(&self, id: NodeId) -> Vec<&Edge> {
        self.edges.values().filter(|e| e.source == id).collect()
    }

    pub fn has_edge(&self, source: NodeId, edge_type: &str, target: NodeId) -> bool {
        self.edge_index
            .contains(&(source, EdgeType::new(edge_type), target))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn statistics(&self) -> GraphStatistics {
        let mut stats = GraphStatistics {
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            ..Default::default()
        };
        for node in self.nodes.values() {
            *stats.nodes_by_label.entry(node.label.to_string()).or_default() += 1;
        }
        for edge in self.edges.values() {
            *stats.edges_by_type.entry(edge.edge_type.to_string()).or_default() += 1;
        }
        stats
    }

    /// Remove every node and edge. Constraints survive, as they do for
    /// `MATCH (n) DETACH DELETE n`.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.label_index.clear();
        self.merge_index.clear();
        self.edge_index.clear();
        self.next_node_id = 1;
        self.next_edge_id = 1;
    }

    fn allocate_node(&mut self, label: Label) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        self.label_index.entry(label.clone()).or_default().insert(id);
        self.nodes.insert(id, Node::new(id, label));
        id
    }
}
