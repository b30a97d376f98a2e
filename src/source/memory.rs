//! In-memory document source

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;

use super::{DocumentSource, RecordStream, SourceRecord, SourceResult};

/// A fixed list of records, yielded in insertion order on every pass
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<SourceRecord>,
}

impl MemorySource {
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self { records }
    }

    /// Build from JSON values, each of which must be an object
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> SourceResult<Self> {
        let records = values
            .into_iter()
            .map(SourceRecord::from_value)
            .collect::<SourceResult<Vec<_>>>()?;
        Ok(Self { records })
    }

    pub fn push(&mut self, record: SourceRecord) {
        self.records.push(record);
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    fn describe(&self) -> String {
        format!("memory ({} records)", self.records.len())
    }

    async fn count(&self) -> SourceResult<u64> {
        Ok(self.records.len() as u64)
    }

    async fn stream(&self) -> SourceResult<RecordStream<'_>> {
        Ok(stream::iter(self.records.iter().cloned().map(Ok)).boxed())
    }
}
