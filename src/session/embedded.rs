//! EmbeddedSession: in-process graph store
//!
//! Applies statements directly to a `MemoryGraph`; no Cypher is parsed.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::graph::{Label, MemoryGraph};
use crate::statement::Statement;

use super::{CypherQuery, GraphSession, GraphStatus, QueryResult, SessionError, SessionResult};

/// Session over a shared in-memory graph
#[derive(Debug, Clone)]
pub struct EmbeddedSession {
    graph: Arc<RwLock<MemoryGraph>>,
}

impl EmbeddedSession {
    pub fn new() -> Self {
        Self::with_graph(Arc::new(RwLock::new(MemoryGraph::new())))
    }

    /// Wrap an existing graph, e.g. to inspect it after a migration
    pub fn with_graph(graph: Arc<RwLock<MemoryGraph>>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &Arc<RwLock<MemoryGraph>> {
        &self.graph
    }

    pub async fn graph_read(&self) -> tokio::sync::RwLockReadGuard<'_, MemoryGraph> {
        self.graph.read().await
    }
}

impl Default for EmbeddedSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphSession for EmbeddedSession {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn run(&self, statement: &Statement) -> SessionResult<()> {
        let mut graph = self.graph.write().await;
        match statement {
            Statement::CreateConstraint { label, property } => {
                graph.create_constraint(label.as_str(), property.as_str());
            }
            Statement::DeleteAll => graph.clear(),
            Statement::UpsertFilm(film) => {
                let id = graph.merge_node(Label::FILM, "id", &film.id);
                graph.set_properties(id, film.film_properties())?;
            }
            Statement::MergeLink { link, film_id, name } => {
                let other = graph.merge_node(link.label(), "name", name);
                let film = graph.merge_node(Label::FILM, "id", film_id);
                if link.outgoing_from_film() {
                    graph.merge_edge(film, link.edge_type(), other)?;
                } else {
                    graph.merge_edge(other, link.edge_type(), film)?;
                }
            }
        }
        Ok(())
    }

    async fn query(&self, _query: &CypherQuery) -> SessionResult<QueryResult> {
        Err(SessionError::Unsupported {
            backend: self.backend(),
            operation: "cypher query",
        })
    }

    async fn status(&self) -> SessionResult<GraphStatus> {
        let graph = self.graph.read().await;
        Ok(GraphStatus {
            backend: self.backend().to_string(),
            nodes: graph.node_count() as u64,
            edges: graph.edge_count() as u64,
        })
    }
}
