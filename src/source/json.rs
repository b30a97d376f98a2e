//! File-backed document source
//!
//! Reads either a JSON array of objects or JSON-lines (one object per line,
//! as produced by `mongoexport`). The file is re-read on every pass.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{DocumentSource, RecordStream, SourceRecord, SourceResult};

#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the whole file.
    ///
    /// A malformed JSON array fails the whole read. In JSON-lines mode a bad
    /// line only fails that record, so one corrupt line never hides the rest.
    async fn load(&self) -> SourceResult<Vec<SourceResult<SourceRecord>>> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let trimmed = text.trim_start();

        if trimmed.starts_with('[') {
            let values: Vec<Value> = serde_json::from_str(trimmed)?;
            debug!("Loaded {} records from JSON array {:?}", values.len(), self.path);
            return Ok(values.into_iter().map(SourceRecord::from_value).collect());
        }

        let records: Vec<_> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                serde_json::from_str::<Value>(line)
                    .map_err(Into::into)
                    .and_then(SourceRecord::from_value)
            })
            .collect();
        debug!("Loaded {} lines from JSON-lines file {:?}", records.len(), self.path);
        Ok(records)
    }
}

#[async_trait]
impl DocumentSource for JsonFileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    async fn count(&self) -> SourceResult<u64> {
        Ok(self.load().await?.len() as u64)
    }

    async fn stream(&self) -> SourceResult<RecordStream<'_>> {
        let records = self.load().await?;
        Ok(stream::iter(records).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_json_array() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"[{{"_id": "1", "title": "X"}}, {{"_id": "2"}}]"#).unwrap();

        let source = JsonFileSource::new(file.path());
        assert_eq!(source.count().await.unwrap(), 2);

        let records: Vec<_> = source.stream().await.unwrap().collect().await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_json_lines_isolates_bad_lines() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"_id": "1"}}"#).unwrap();
        writeln!(file, "{{not json").unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"_id": "3"}}"#).unwrap();

        let source = JsonFileSource::new(file.path());
        let records: Vec<_> = source.stream().await.unwrap().collect().await;
        assert_eq!(records.len(), 3);
        assert!(records[0].is_ok());
        assert!(records[1].is_err());
        assert!(records[2].is_ok());
    }

    #[tokio::test]
    async fn test_missing_file() {
        let source = JsonFileSource::new("/nonexistent/films.json");
        assert!(source.count().await.is_err());
    }
}
