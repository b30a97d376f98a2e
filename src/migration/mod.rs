//! Migration driver
//!
//! One pass copies every source document into the graph:
//!
//! 1. wipe the target graph
//! 2. declare the uniqueness constraints
//! 3. stream each record through the normalizer and the upsert engine
//!
//! A failure in steps 1 or 2 aborts the pass before any film is written.
//! During step 3 a failing record is logged, counted and skipped. A read
//! error from the store itself ends the stream early: the pass still
//! completes, with the error kept in [`MigrationReport::interrupted`].

pub mod phase;
pub mod progress;
pub mod report;

use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::normalize::{normalize, record_id};
use crate::schema::initialize_schema;
use crate::session::{GraphSession, SessionError};
use crate::source::{DocumentSource, SourceError};
use crate::statement::Statement;
use crate::upsert::upsert_film;

pub use phase::MigrationPhase;
pub use progress::{BarProgress, NoProgress, ProgressSink};
pub use report::{DeadLetterFile, FailedRecord, MigrationReport};

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Migration aborted while {phase}: {source}")]
    Graph {
        phase: MigrationPhase,
        #[source]
        source: SessionError,
    },

    #[error("Migration aborted while {phase}: cannot read source: {source}")]
    Source {
        phase: MigrationPhase,
        #[source]
        source: SourceError,
    },

    #[error("Invalid phase transition {from} -> {to}")]
    InvalidTransition { from: MigrationPhase, to: MigrationPhase },
}

pub type MigrationResult<T> = Result<T, MigrationError>;

/// Drives a single migration pass from a document source into a graph session
pub struct Migration<'a> {
    source: &'a dyn DocumentSource,
    session: &'a dyn GraphSession,
    dead_letter: Option<DeadLetterFile>,
    phase: MigrationPhase,
}

impl<'a> Migration<'a> {
    pub fn new(source: &'a dyn DocumentSource, session: &'a dyn GraphSession) -> Self {
        Self {
            source,
            session,
            dead_letter: None,
            phase: MigrationPhase::Idle,
        }
    }

    /// Also append failed records to a JSON-lines file
    pub fn with_dead_letter(mut self, dead_letter: Option<DeadLetterFile>) -> Self {
        self.dead_letter = dead_letter;
        self
    }

    pub fn phase(&self) -> MigrationPhase {
        self.phase
    }

    fn transition(&mut self, report: &mut MigrationReport, next: MigrationPhase) -> MigrationResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(MigrationError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        debug!("Migration {} -> {}", self.phase, next);
        self.phase = next;
        report.phase = next;
        Ok(())
    }

    fn abort(&mut self, report: &mut MigrationReport, progress: &dyn ProgressSink, err: MigrationError) -> MigrationError {
        error!("{}", err);
        if self.phase.can_transition_to(MigrationPhase::Aborted) {
            self.phase = MigrationPhase::Aborted;
            report.phase = MigrationPhase::Aborted;
        }
        report.finished_at = Some(chrono::Utc::now());
        progress.finish(report);
        err
    }

    /// Run the pass. Returns the report on completion, or the setup error
    /// that aborted it.
    pub async fn run(&mut self, progress: &dyn ProgressSink) -> MigrationResult<MigrationReport> {
        if self.phase != MigrationPhase::Idle {
            return Err(MigrationError::InvalidTransition {
                from: self.phase,
                to: MigrationPhase::ClearingGraph,
            });
        }

        let mut report = MigrationReport::new(self.source.describe(), self.session.backend());
        info!(
            "Starting migration {} from {} into {} graph",
            report.run_id, report.source, report.backend
        );

        // Size the pass before touching the graph, so an unreachable source
        // leaves the existing graph intact.
        report.expected = match self.source.count().await {
            Ok(count) => count,
            Err(source) => {
                let err = MigrationError::Source {
                    phase: self.phase,
                    source,
                };
                return Err(self.abort(&mut report, progress, err));
            }
        };

        self.transition(&mut report, MigrationPhase::ClearingGraph)?;
        if let Err(source) = self.session.run(&Statement::DeleteAll).await {
            let err = MigrationError::Graph {
                phase: self.phase,
                source,
            };
            return Err(self.abort(&mut report, progress, err));
        }
        info!("Cleared target graph");

        self.transition(&mut report, MigrationPhase::InitializingSchema)?;
        if let Err(source) = initialize_schema(self.session).await {
            let err = MigrationError::Graph {
                phase: self.phase,
                source,
            };
            return Err(self.abort(&mut report, progress, err));
        }

        let mut records = match self.source.stream().await {
            Ok(records) => records,
            Err(source) => {
                let err = MigrationError::Source {
                    phase: self.phase,
                    source,
                };
                return Err(self.abort(&mut report, progress, err));
            }
        };

        self.transition(&mut report, MigrationPhase::Streaming)?;
        info!("Migrating {} records", report.expected);
        progress.start(report.expected);

        while let Some(next) = records.next().await {
            let record = match next {
                Ok(record) => record,
                Err(err) if err.is_record_error() => {
                    error!("Failed to read source record: {}", err);
                    self.record_failure(&mut report, progress, String::new(), err.to_string(), serde_json::Value::Null)
                        .await;
                    continue;
                }
                Err(err) => {
                    error!(
                        "Source read failed after {} of {} records, ending the pass: {}",
                        report.processed(),
                        report.expected,
                        err
                    );
                    report.interrupted = Some(err.to_string());
                    break;
                }
            };

            let film = normalize(&record);
            match upsert_film(self.session, &film).await {
                Ok(outcome) => {
                    report.succeeded += 1;
                    report.statements += outcome.statements() as u64;
                    progress.record(&film.id, true);
                }
                Err(err) => {
                    let raw = record.to_json_string();
                    error!(film_id = %film.id, record = %raw, "Failed to migrate record: {}", err);
                    self.record_failure(&mut report, progress, record_id(&record), err.to_string(), record.into_value())
                        .await;
                }
            }
        }

        self.transition(&mut report, MigrationPhase::Completed)?;
        report.finished_at = Some(chrono::Utc::now());
        info!(
            "Migration {} completed: {} migrated, {} failed in {}ms",
            report.run_id,
            report.succeeded,
            report.failed,
            report.elapsed().num_milliseconds()
        );
        progress.finish(&report);
        Ok(report)
    }

    async fn record_failure(
        &self,
        report: &mut MigrationReport,
        progress: &dyn ProgressSink,
        id: String,
        error: String,
        raw: serde_json::Value,
    ) {
        report.failed += 1;
        progress.record(&id, false);

        let failed = FailedRecord { id, error, raw };
        if let Some(dead_letter) = &self.dead_letter {
            if let Err(err) = dead_letter.append(&failed).await {
                warn!("Could not write to dead-letter file {:?}: {}", dead_letter.path(), err);
            }
        }
        report.failures.push(failed);
    }
}

/// Run one pass with the given collaborators
pub async fn migrate(
    source: &dyn DocumentSource,
    session: &dyn GraphSession,
    dead_letter: Option<DeadLetterFile>,
    progress: &dyn ProgressSink,
) -> MigrationResult<MigrationReport> {
    Migration::new(source, session)
        .with_dead_letter(dead_letter)
        .run(progress)
        .await
}

/// Run one pass, then close the source whether or not the pass succeeded
pub async fn migrate_and_close(
    source: &dyn DocumentSource,
    session: &dyn GraphSession,
    dead_letter: Option<DeadLetterFile>,
    progress: &dyn ProgressSink,
) -> MigrationResult<MigrationReport> {
    let result = migrate(source, session, dead_letter, progress).await;
    source.close().await;
    result
}
