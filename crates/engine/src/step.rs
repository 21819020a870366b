//! Step records and reusable step functions.
//!
//! A step is recorded as a [`StepRecord`] node inside the report of the
//! running target. Nesting is derived from the dynamic call structure: a step
//! started while another step is active becomes its child.

use std::{fmt, rc::Rc, time::Duration};

use chrono::{DateTime, Utc};
use fruit_types::StepStatus;

use crate::{error::GardenError, garden::Garden, signal::StepResult};

/// Prefix given to steps created by calling a target from inside another one.
pub const SUBTARGET_PREFIX: &str = "TARGET: ";

/// One executed step and the steps it started.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub name: String,
    pub description: String,
    /// 1-based position among its siblings.
    pub number: u32,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub children: Vec<StepRecord>,
}

impl StepRecord {
    /// Creates a pending record; fails on an empty name or a zero number.
    pub fn new(name: impl Into<String>, description: impl Into<String>, number: u32) -> Result<Self, GardenError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GardenError::validation("step name", "name must not be empty"));
        }
        if number == 0 {
            return Err(GardenError::validation("step number", format!("step '{name}' must have a positive number")));
        }
        Ok(Self {
            name,
            description: description.into(),
            number,
            status: StepStatus::Pending,
            started_at: Utc::now(),
            elapsed: Duration::ZERO,
            children: Vec::new(),
        })
    }
}

/// Snapshot of a step handed to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct StepEvent {
    /// Dotted position within the run, e.g. `2.1`.
    pub label: String,
    pub name: String,
    pub description: String,
    /// Zero for steps started directly by the target body.
    pub depth: usize,
    pub status: StepStatus,
    pub elapsed: Duration,
    /// True when the step wraps a nested target invocation.
    pub subtarget: bool,
}

/// A named, reusable step body.
///
/// ```rust
/// use fruit_engine::{Garden, StepFn};
///
/// let compile = StepFn::new("compile", "Compile sources", |_garden: &mut Garden| Ok(())).unwrap();
/// let mut garden = Garden::new();
/// garden
///     .register_target("build", "Build everything", move |garden| {
///         garden.run_step(&compile)?;
///         Ok(())
///     })
///     .unwrap();
/// let report = garden.make_target("build").unwrap();
/// assert_eq!(report.steps.len(), 1);
/// ```
pub struct StepFn<T = ()> {
    name: String,
    description: String,
    pub(crate) body: Rc<dyn Fn(&mut Garden) -> StepResult<T>>,
}

impl<T> StepFn<T> {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        body: impl Fn(&mut Garden) -> StepResult<T> + 'static,
    ) -> Result<Self, GardenError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GardenError::validation("step name", "name must not be empty"));
        }
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
}

impl<T> Clone for StepFn<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            description: self.description.clone(),
            body: Rc::clone(&self.body),
        }
    }
}

impl<T> fmt::Debug for StepFn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepFn")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
