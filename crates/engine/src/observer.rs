//! Run notifications.
//!
//! The [`Garden`](crate::Garden) reports activation, step progress and the
//! final report through a single [`RunObserver`]. Every method has an empty
//! default so implementations only override what they render.

use crate::{step::StepEvent, target::TargetReport};

pub trait RunObserver {
    /// A top-level target became active.
    fn target_activated(&mut self, _name: &str, _description: &str) {}

    fn step_started(&mut self, _step: &StepEvent) {}

    fn step_skipped(&mut self, _step: &StepEvent, _reason: Option<&str>) {}

    fn step_failed(&mut self, _step: &StepEvent, _reason: Option<&str>) {}

    /// The step aborted; the abort keeps propagating after this call.
    fn step_aborted(&mut self, _step: &StepEvent, _reason: Option<&str>) {}

    /// Called for every step once its status is final, after the
    /// skip/fail/abort notification.
    fn step_finished(&mut self, _step: &StepEvent) {}

    /// The target is no longer active; always called, whatever the outcome.
    fn target_deactivated(&mut self, _report: &TargetReport) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl RunObserver for NullObserver {}
