//! Control-flow signals returned by step and target bodies.
//!
//! A body returns `Ok(value)` when it finished normally or `Err(Signal)` to
//! leave early. The engine pattern-matches the signal when the step scope
//! closes:
//!
//! - [`Signal::Skip`] and [`Signal::Fail`] are consumed by the step that
//!   produced them; the caller keeps running.
//! - [`Signal::Abort`] is re-raised through every enclosing step and absorbed
//!   at the target boundary.
//!
//! Any other error converted with `?` (`anyhow::Error`, `std::io::Error`,
//! shell and engine errors) becomes an `Abort` carrying the error message.

use std::io;

use fruit_types::StepStatus;
use fruit_util::ShellError;
use thiserror::Error;

use crate::error::GardenError;

/// Result type of every step and target body.
pub type StepResult<T = ()> = Result<T, Signal>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Signal {
    /// Stop evaluating the current step; not an error.
    #[error("step skipped{}", reason_suffix(.0))]
    Skip(Option<String>),
    /// The current step did not succeed, but the run continues.
    #[error("step failed{}", reason_suffix(.0))]
    Fail(Option<String>),
    /// Stop the whole run.
    #[error("run aborted{}", reason_suffix(.0))]
    Abort(Option<String>),
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) if !reason.is_empty() => format!(": {reason}"),
        _ => String::new(),
    }
}

impl Signal {
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip(Some(reason.into()))
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self::Fail(Some(reason.into()))
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        Self::Abort(Some(reason.into()))
    }

    /// Reason attached to the signal, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Skip(reason) | Self::Fail(reason) | Self::Abort(reason) => reason.as_deref(),
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Abort(_))
    }
}

/// Leaves the current step as skipped.
///
/// ```rust
/// use fruit_engine::{StepResult, skip};
///
/// fn docs(has_docs: bool) -> StepResult {
///     if !has_docs {
///         return skip("no docs directory");
///     }
///     Ok(())
/// }
/// assert!(docs(false).is_err());
/// ```
pub fn skip<T>(reason: impl Into<String>) -> StepResult<T> {
    Err(Signal::skip(reason))
}

/// Marks the current step as failed and lets the run continue.
pub fn fail<T>(reason: impl Into<String>) -> StepResult<T> {
    Err(Signal::fail(reason))
}

/// Aborts the whole run.
pub fn abort<T>(reason: impl Into<String>) -> StepResult<T> {
    Err(Signal::abort(reason))
}

impl From<anyhow::Error> for Signal {
    fn from(error: anyhow::Error) -> Self {
        Self::Abort(Some(format!("{error:#}")))
    }
}

impl From<io::Error> for Signal {
    fn from(error: io::Error) -> Self {
        Self::Abort(Some(error.to_string()))
    }
}

impl From<ShellError> for Signal {
    fn from(error: ShellError) -> Self {
        Self::Abort(Some(error.to_string()))
    }
}

impl From<GardenError> for Signal {
    fn from(error: GardenError) -> Self {
        Self::Abort(Some(error.to_string()))
    }
}

/// How a target invocation (or a body) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Skipped(Option<String>),
    Failed(Option<String>),
    Aborted(Option<String>),
}

impl Outcome {
    pub fn from_result<T>(result: &StepResult<T>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(Signal::Skip(reason)) => Self::Skipped(reason.clone()),
            Err(Signal::Fail(reason)) => Self::Failed(reason.clone()),
            Err(Signal::Abort(reason)) => Self::Aborted(reason.clone()),
        }
    }

    pub fn status(&self) -> StepStatus {
        match self {
            Self::Ok => StepStatus::Ok,
            Self::Skipped(_) => StepStatus::Skipped,
            Self::Failed(_) => StepStatus::Failed,
            Self::Aborted(_) => StepStatus::Aborted,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Ok => None,
            Self::Skipped(reason) | Self::Failed(reason) | Self::Aborted(reason) => reason.as_deref(),
        }
    }
}
