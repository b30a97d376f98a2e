//! MongoDB document source
//!
//! Reads the configured collection with an unfiltered, unprojected `find`,
//! so records arrive in natural storage order with every field present.
//! Also executes the predefined document catalog queries.

use async_trait::async_trait;
use futures::stream::{StreamExt, TryStreamExt};
use mongodb::bson::{Bson, Document};
use mongodb::options::{ClientOptions, FindOptions};
use mongodb::{Client, Collection};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{DocumentQueryExecutor, DocumentSource, RecordStream, SourceError, SourceRecord, SourceResult};
use crate::catalog::DocumentOp;
use crate::config::SourceConfig;
use crate::session::QueryResult;

/// Row limit for `find` queries that declare none
pub const DEFAULT_FIND_LIMIT: i64 = 10;

pub struct MongoSource {
    client: Client,
    collection: Collection<Document>,
    namespace: String,
}

impl MongoSource {
    /// Connect to the configured collection.
    ///
    /// The driver connects lazily, so the first `count` or `stream` call is
    /// where an unreachable server surfaces.
    pub async fn connect(config: &SourceConfig) -> SourceResult<Self> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.app_name = Some("filmgraph".to_string());
        let client = Client::with_options(options)?;
        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);

        info!("Using document collection {}.{}", config.database, config.collection);
        Ok(Self {
            client,
            collection,
            namespace: format!("{}.{}", config.database, config.collection),
        })
    }

    /// Run a catalog operation and tabulate its documents.
    ///
    /// `limit` overrides the default row limit of `find` operations.
    pub async fn run_document_query(&self, op: &DocumentOp, limit: Option<i64>) -> SourceResult<QueryResult> {
        debug!("Running {} against {}", op.kind(), self.namespace);
        let documents: Vec<Document> = match op {
            DocumentOp::Aggregate(pipeline) => {
                self.collection
                    .aggregate(pipeline.clone(), None)
                    .await?
                    .try_collect()
                    .await?
            }
            DocumentOp::Count(filter) => {
                let count = self.collection.count_documents(filter.clone(), None).await?;
                let mut result = QueryResult::new(vec!["count".to_string()]);
                result.records.push(vec![Value::from(count)]);
                return Ok(result);
            }
            DocumentOp::Find {
                filter,
                projection,
                limit: default_limit,
            } => {
                let options = FindOptions::builder()
                    .projection(projection.clone())
                    .limit(limit.or(*default_limit).or(Some(DEFAULT_FIND_LIMIT)))
                    .build();
                self.collection
                    .find(filter.clone(), options)
                    .await?
                    .try_collect()
                    .await?
            }
        };

        Ok(QueryResult::from_objects(
            documents.into_iter().map(document_to_json).collect(),
        ))
    }
}

#[async_trait]
impl DocumentSource for MongoSource {
    fn describe(&self) -> String {
        format!("mongodb {}", self.namespace)
    }

    async fn count(&self) -> SourceResult<u64> {
        Ok(self.collection.count_documents(None, None).await?)
    }

    async fn stream(&self) -> SourceResult<RecordStream<'_>> {
        let cursor = self.collection.find(None, None).await?;
        Ok(cursor
            .map(|result| {
                result
                    .map(|document| SourceRecord::new(document_to_json(document)))
                    .map_err(SourceError::from)
            })
            .boxed())
    }

    /// Close the connection pools once every open cursor has been dropped
    async fn close(&self) {
        debug!("Closing connections to {}", self.namespace);
        self.client.clone().shutdown().await;
    }
}

#[async_trait]
impl DocumentQueryExecutor for MongoSource {
    async fn execute(&self, op: &DocumentOp, limit: Option<i64>) -> SourceResult<QueryResult> {
        self.run_document_query(op, limit).await
    }
}

/// Convert a BSON document to a JSON object.
///
/// Top-level object ids become their hex string; everything else uses
/// relaxed extended JSON, so numbers stay numbers.
pub fn document_to_json(document: Document) -> Map<String, Value> {
    document
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Bson::ObjectId(oid) => Value::String(oid.to_hex()),
                other => other.into_relaxed_extjson(),
            };
            (key, value)
        })
        .collect()
}
