//! BoltSession: Neo4j over the Bolt protocol

use async_trait::async_trait;
use neo4rs::{BoltNull, BoltType, ConfigBuilder, Graph, Query};
use tracing::{debug, info};

use crate::config::GraphConfig;
use crate::graph::PropertyValue;
use crate::statement::{Params, Statement};

use super::{
    single_count, CypherQuery, GraphSession, GraphStatus, QueryResult, SessionError,
    SessionResult, EDGE_COUNT, NODE_COUNT,
};

/// Network session backed by a pooled `neo4rs::Graph`
pub struct BoltSession {
    graph: Graph,
}

impl BoltSession {
    /// Connect and verify the store answers a trivial query
    pub async fn connect(config: &GraphConfig) -> SessionResult<Self> {
        info!("Connecting to Neo4j at {}", config.uri);
        let neo4j_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.username.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .fetch_size(config.fetch_size)
            .build()
            .map_err(|e| SessionError::ConnectionError(format!("invalid Neo4j configuration: {}", e)))?;

        let graph = Graph::connect(neo4j_config)
            .await
            .map_err(|e| SessionError::ConnectionError(format!("failed to connect to {}: {}", config.uri, e)))?;

        graph
            .run(neo4rs::query("RETURN 1"))
            .await
            .map_err(|e| SessionError::ConnectionError(format!("{} is not answering: {}", config.uri, e)))?;

        Ok(Self { graph })
    }
}

/// A column the driver cannot turn into JSON fails the whole query, so a
/// decode problem never reads as a null cell.
fn decode_cell<E: std::fmt::Display>(
    column: &str,
    value: Result<serde_json::Value, E>,
) -> SessionResult<serde_json::Value> {
    value.map_err(|e| SessionError::QueryError(format!("cannot decode column {}: {}", column, e)))
}

/// Bind parameters onto a Bolt query
fn to_bolt_query(text: &str, params: &Params) -> Query {
    params.iter().fold(neo4rs::query(text), |q, (key, value)| {
        let bolt: BoltType = match value {
            PropertyValue::String(s) => s.clone().into(),
            PropertyValue::Integer(i) => (*i).into(),
            PropertyValue::Float(f) => (*f).into(),
            PropertyValue::Boolean(b) => (*b).into(),
            PropertyValue::Null => BoltType::Null(BoltNull),
        };
        q.param(key, bolt)
    })
}

#[async_trait]
impl GraphSession for BoltSession {
    fn backend(&self) -> &'static str {
        "bolt"
    }

    async fn run(&self, statement: &Statement) -> SessionResult<()> {
        debug!("bolt {}: {:?}", statement.kind(), statement.params());
        self.graph
            .run(to_bolt_query(&statement.cypher(), &statement.params()))
            .await?;
        Ok(())
    }

    async fn query(&self, query: &CypherQuery) -> SessionResult<QueryResult> {
        let mut rows = self
            .graph
            .execute(to_bolt_query(&query.text, &query.params))
            .await?;

        let mut result = QueryResult::new(query.columns.clone());
        while let Some(row) = rows.next().await? {
            let cells = query
                .columns
                .iter()
                .map(|column| decode_cell(column, row.get::<serde_json::Value>(column)))
                .collect::<SessionResult<Vec<_>>>()?;
            result.records.push(cells);
        }
        Ok(result)
    }

    async fn status(&self) -> SessionResult<GraphStatus> {
        let nodes = self.query(&CypherQuery::new(NODE_COUNT, &["count"])).await?;
        let edges = self.query(&CypherQuery::new(EDGE_COUNT, &["count"])).await?;
        Ok(GraphStatus {
            backend: self.backend().to_string(),
            nodes: single_count(&nodes),
            edges: single_count(&edges),
        })
    }
}
