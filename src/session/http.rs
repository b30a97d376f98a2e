//! HttpSession: Neo4j HTTP transactional endpoint
//!
//! Every call is a single auto-commit request to
//! `POST {base}/db/{database}/tx/commit`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::GraphConfig;
use crate::statement::{Params, Statement};

use super::{
    single_count, CypherQuery, GraphSession, GraphStatus, QueryResult, SessionError,
    SessionResult, EDGE_COUNT, NODE_COUNT,
};

/// Network session that talks JSON over HTTP
pub struct HttpSession {
    commit_url: String,
    username: String,
    password: String,
    http_client: Client,
}

#[derive(Debug, Default, Deserialize)]
struct TxResponse {
    #[serde(default)]
    results: Vec<TxResult>,
    #[serde(default)]
    errors: Vec<TxError>,
}

#[derive(Debug, Default, Deserialize)]
struct TxResult {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<TxRow>,
}

#[derive(Debug, Deserialize)]
struct TxRow {
    row: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct TxError {
    code: String,
    message: String,
}

impl HttpSession {
    /// Create a session for the HTTP base URL in `config.uri` (e.g. `http://localhost:7474`)
    pub fn new(config: &GraphConfig) -> SessionResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            commit_url: format!(
                "{}/db/{}/tx/commit",
                config.uri.trim_end_matches('/'),
                config.database
            ),
            username: config.username.clone(),
            password: config.password.clone(),
            http_client,
        })
    }

    pub fn commit_url(&self) -> &str {
        &self.commit_url
    }

    async fn commit(&self, text: &str, params: &Params) -> SessionResult<TxResult> {
        let parameters: serde_json::Map<String, serde_json::Value> = params
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        let body = serde_json::json!({
            "statements": [{
                "statement": text,
                "parameters": parameters,
                "resultDataContents": ["row"],
            }]
        });

        let response = self
            .http_client
            .post(&self.commit_url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await
            .map_err(|e| SessionError::ConnectionError(format!("{}: {}", self.commit_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::ConnectionError(format!(
                "{} returned {}",
                self.commit_url, status
            )));
        }

        let payload: TxResponse = response.json().await?;
        if let Some(error) = payload.errors.first() {
            return Err(SessionError::QueryError(format!("{}: {}", error.code, error.message)));
        }
        Ok(payload.results.into_iter().next().unwrap_or_default())
    }
}

#[async_trait]
impl GraphSession for HttpSession {
    fn backend(&self) -> &'static str {
        "http"
    }

    async fn run(&self, statement: &Statement) -> SessionResult<()> {
        debug!("http {}: {:?}", statement.kind(), statement.params());
        self.commit(&statement.cypher(), &statement.params()).await?;
        Ok(())
    }

    async fn query(&self, query: &CypherQuery) -> SessionResult<QueryResult> {
        let tx = self.commit(&query.text, &query.params).await?;
        let columns = if tx.columns.is_empty() {
            query.columns.clone()
        } else {
            tx.columns
        };
        Ok(QueryResult {
            columns,
            records: tx.data.into_iter().map(|d| d.row).collect(),
        })
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
