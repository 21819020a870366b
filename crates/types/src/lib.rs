//! Shared type definitions for the Fruit engine, console renderer and CLI.
//!
//! These types carry no behavior beyond small helpers; they exist so that the
//! console crate can render run results without depending on the engine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final (or current) status of a step or a target run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step was entered but has not finished yet.
    #[default]
    Pending,
    /// The body completed without raising a signal.
    Ok,
    /// The body raised `Fail`; the run continued.
    Failed,
    /// The body raised `Skip`.
    Skipped,
    /// The body raised `Abort` (or any unrecognized error); the run stopped.
    Aborted,
}

impl StepStatus {
    /// Human readable label used in summary tables.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Unknown",
            Self::Ok => "OK",
            Self::Failed => "Failed",
            Self::Skipped => "Skipped",
            Self::Aborted => "Aborted",
        }
    }

    /// Returns true when the status should make the process exit non-zero.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Aborted)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One line of a run summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    /// Dotted position of the step within the run (e.g. `1.2`). Empty for the
    /// trailing aborted row.
    pub label: String,
    /// Step name as registered.
    pub name: String,
    /// Final status of the step.
    pub status: StepStatus,
    /// Elapsed wall time in seconds; `None` renders as `N/A`.
    pub elapsed_seconds: Option<f64>,
    /// Nesting depth, zero for steps called directly by the target.
    pub depth: usize,
}

/// Flattened, render-ready summary of one target invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Name of the target that was made.
    pub target: String,
    /// Outcome of the target as a whole.
    pub outcome: StepStatus,
    /// Wall clock time the invocation started.
    pub started_at: DateTime<Utc>,
    /// Total elapsed time of the invocation in seconds.
    pub elapsed_seconds: f64,
    /// Depth-first rows for every executed step.
    pub rows: Vec<SummaryRow>,
    /// Reason carried by the abort signal, when the run was aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
}

impl RunSummary {
    pub fn is_aborted(&self) -> bool {
        self.outcome == StepStatus::Aborted
    }

    /// Number of rows with the given status.
    pub fn count(&self, status: StepStatus) -> usize {
        self.rows.iter().filter(|row| row.status == status).count()
    }
}

/// Name and description pair used when listing targets and providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub description: String,
}
