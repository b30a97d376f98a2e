//! Lifecycle of a migration pass

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a migration pass currently is.
///
/// ```text
/// Idle -> ClearingGraph -> InitializingSchema -> Streaming -> Completed
///   \__________\_________________\
///                                 -> Aborted
/// ```
///
/// Only the setup phases can abort. Once streaming, record failures are
/// counted and the pass always runs to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MigrationPhase {
    Idle,
    ClearingGraph,
    InitializingSchema,
    Streaming,
    Completed,
    Aborted,
}

impl MigrationPhase {
    pub fn can_transition_to(self, next: MigrationPhase) -> bool {
        use MigrationPhase::*;
        matches!(
            (self, next),
            (Idle, ClearingGraph)
                | (ClearingGraph, InitializingSchema)
                | (InitializingSchema, Streaming)
                | (Streaming, Completed)
                | (Idle | ClearingGraph | InitializingSchema, Aborted)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MigrationPhase::Completed | MigrationPhase::Aborted)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MigrationPhase::Idle => "idle",
            MigrationPhase::ClearingGraph => "clearing-graph",
            MigrationPhase::InitializingSchema => "initializing-schema",
            MigrationPhase::Streaming => "streaming",
            MigrationPhase::Completed => "completed",
            MigrationPhase::Aborted => "aborted",
        }
    }
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
