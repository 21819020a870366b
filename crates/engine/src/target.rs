//! Targets and the reports produced by invoking them.

use std::{fmt, rc::Rc, time::Duration};

use chrono::{DateTime, Utc};
use fruit_types::{RunSummary, StepStatus, SummaryRow};

use crate::{
    error::{GardenError, validate_name},
    garden::Garden,
    signal::{Outcome, StepResult},
    step::StepRecord,
};

/// Body of a target.
pub type TargetBody = Rc<dyn Fn(&mut Garden) -> StepResult>;

/// A named top-level runnable. Immutable once registered.
#[derive(Clone)]
pub struct Target {
    name: String,
    description: String,
    pub(crate) body: TargetBody,
}

impl Target {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        body: impl Fn(&mut Garden) -> StepResult + 'static,
    ) -> Result<Self, GardenError> {
        let name = name.into();
        validate_name("target name", &name)?;
        Ok(Self {
            name,
            description: description.into(),
            body: Rc::new(body),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn handle(&self) -> TargetHandle {
        TargetHandle { name: self.name.clone() }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Lightweight reference to a registered target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetHandle {
    name: String,
}

impl TargetHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the target. Inside a running body it becomes a nested
    /// `TARGET: <name>` step; see [`Garden::call_target`].
    pub fn make(&self, garden: &mut Garden) -> StepResult<bool> {
        garden.call_target(&self.name)
    }
}

/// Everything recorded during one invocation of a target.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetReport {
    pub target: String,
    pub description: String,
    pub outcome: Outcome,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Steps started directly by the target body, in invocation order.
    pub steps: Vec<StepRecord>,
}

impl TargetReport {
    pub fn status(&self) -> StepStatus {
        self.outcome.status()
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, Outcome::Aborted(_))
    }

    /// True when the run was not aborted or failed and no step failed.
    pub fn succeeded(&self) -> bool {
        !self.status().is_failure() && self.flatten().iter().all(|entry| !entry.record.status.is_failure())
    }

    /// Looks a step up by its dotted label, e.g. `2.1`.
    pub fn find(&self, label: &str) -> Option<&StepRecord> {
        let mut siblings = &self.steps;
        let mut found = None;
        for part in label.split('.') {
            let number: u32 = part.parse().ok()?;
            let record = siblings.iter().find(|record| record.number == number)?;
            siblings = &record.children;
            found = Some(record);
        }
        found
    }

    /// Depth-first view of every recorded step.
    pub fn flatten(&self) -> Vec<FlatStep<'_>> {
        let mut entries = Vec::new();
        for record in &self.steps {
            flatten_into(record, "", 0, &mut entries);
        }
        entries
    }

    /// Render-ready summary; aborted runs get a trailing row for the target.
    pub fn summary(&self) -> RunSummary {
        let mut rows: Vec<SummaryRow> = self
            .flatten()
            .into_iter()
            .map(|entry| SummaryRow {
                label: entry.label,
                name: entry.record.name.clone(),
                status: entry.record.status,
                elapsed_seconds: Some(entry.record.elapsed.as_secs_f64()),
                depth: entry.depth,
            })
            .collect();
        if self.is_aborted() {
            rows.push(SummaryRow {
                label: String::new(),
                name: self.target.clone(),
                status: StepStatus::Aborted,
                elapsed_seconds: None,
                depth: 0,
            });
        }
        RunSummary {
            target: self.target.clone(),
            outcome: self.status(),
            started_at: self.started_at,
            elapsed_seconds: self.elapsed.as_secs_f64(),
            rows,
            abort_reason: match &self.outcome {
                Outcome::Aborted(reason) => reason.clone(),
                _ => None,
            },
        }
    }
}

/// A step together with its position in the run.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatStep<'a> {
    pub label: String,
    pub depth: usize,
    pub record: &'a StepRecord,
}

fn flatten_into<'a>(record: &'a StepRecord, prefix: &str, depth: usize, entries: &mut Vec<FlatStep<'a>>) {
    let label = if prefix.is_empty() {
        record.number.to_string()
    } else {
        format!("{prefix}.{}", record.number)
    };
    entries.push(FlatStep {
        label: label.clone(),
        depth,
        record,
    });
    for child in &record.children {
        flatten_into(child, &label, depth + 1, entries);
    }
}
