//! Migration run summary and dead-letter output

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::MigrationPhase;

/// A record that could not be migrated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRecord {
    /// Source identifier, empty when the record could not be read
    pub id: String,
    pub error: String,
    /// The record as read from the source (`null` if unreadable)
    #[serde(rename = "record")]
    pub raw: Value,
}

/// Outcome of one migration pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub run_id: Uuid,
    pub source: String,
    pub backend: String,
    pub phase: MigrationPhase,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Records the source reported before streaming
    pub expected: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Graph statements issued by successful records
    pub statements: u64,
    pub failures: Vec<FailedRecord>,
    /// Read error that ended the stream before the source was exhausted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<String>,
}

impl MigrationReport {
    pub fn new(source: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source: source.into(),
            backend: backend.into(),
            phase: MigrationPhase::Idle,
            started_at: Utc::now(),
            finished_at: None,
            expected: 0,
            succeeded: 0,
            failed: 0,
            statements: 0,
            failures: Vec::new(),
            interrupted: None,
        }
    }

    /// Records attempted so far
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }

    /// Completed and read the source to its end
    pub fn is_complete(&self) -> bool {
        self.phase == MigrationPhase::Completed && self.interrupted.is_none()
    }
}

/// Appends failed records to a JSON-lines file
#[derive(Debug, Clone)]
pub struct DeadLetterFile {
    path: PathBuf,
}

impl DeadLetterFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &FailedRecord) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await
    }
}
