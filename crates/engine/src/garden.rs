//! The execution context holding every registered target and provider.
//!
//! A [`Garden`] is created once by the host, filled with registrations, and
//! then asked to make targets. While a target runs, the garden owns the active
//! run: the step tree collected so far and the stack of in-flight steps. Each
//! step pushes itself on entry and truncates the stack back to its entry depth
//! on exit, whatever its outcome, so the stack unwinds level by level when an
//! abort propagates.

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
    time::{Duration, Instant},
};

use anyhow::Result;
use chrono::Utc;
use fruit_types::StepStatus;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::{
    error::{EntryKind, GardenError},
    observer::{NullObserver, RunObserver},
    provider::Provider,
    signal::{Outcome, Signal, StepResult},
    step::{SUBTARGET_PREFIX, StepEvent, StepFn, StepRecord},
    target::{Target, TargetHandle, TargetReport},
};

/// Return code in effect until a run completes successfully.
pub const DEFAULT_RETURN_CODE: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReturnCode {
    value: i32,
    /// Set by an explicit `set_return_code`; the engine leaves it alone.
    pinned: bool,
}

impl Default for ReturnCode {
    fn default() -> Self {
        Self {
            value: DEFAULT_RETURN_CODE,
            pinned: false,
        }
    }
}

/// State of the target currently being made.
#[derive(Debug)]
struct ActiveRun {
    target: String,
    steps: Vec<StepRecord>,
    /// Child indices from the root down to the active step.
    stack: Vec<usize>,
    /// Reason of the first abort; once set no further step may start.
    aborted: Option<String>,
}

impl ActiveRun {
    fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            steps: Vec::new(),
            stack: Vec::new(),
            aborted: None,
        }
    }

    /// Children of the active step, or the root list when no step is active.
    fn children_mut(&mut self) -> &mut Vec<StepRecord> {
        let mut children = &mut self.steps;
        for &index in &self.stack {
            children = &mut children[index].children;
        }
        children
    }

    fn current_mut(&mut self) -> Option<&mut StepRecord> {
        let (last, parents) = self.stack.split_last()?;
        let mut children = &mut self.steps;
        for &index in parents {
            children = &mut children[index].children;
        }
        children.get_mut(*last)
    }

    fn label(&self) -> String {
        let mut children = &self.steps;
        let mut parts = Vec::with_capacity(self.stack.len());
        for &index in &self.stack {
            let record = &children[index];
            parts.push(record.number.to_string());
            children = &record.children;
        }
        parts.join(".")
    }
}

struct StepFrame {
    entry_depth: usize,
    event: StepEvent,
    started: Instant,
}

/// Registry of targets and providers plus the state of the running target.
///
/// ```rust
/// use fruit_engine::{Garden, fail};
///
/// let mut garden = Garden::new();
/// garden
///     .register_target("check", "Run the checks", |garden| {
///         garden.step("fmt", "Formatting", |_| Ok(()))?;
///         garden.step("lint", "Lints", |_| fail::<()>("2 warnings"))?;
///         Ok(())
///     })
///     .unwrap();
///
/// let report = garden.make_target("check").unwrap();
/// assert_eq!(report.steps.len(), 2);
/// assert_eq!(garden.return_code(), 1);
/// ```
pub struct Garden {
    targets: IndexMap<String, Target>,
    providers: IndexMap<String, Provider>,
    active: Option<ActiveRun>,
    return_code: ReturnCode,
    observer: Box<dyn RunObserver>,
    reports: IndexMap<String, TargetReport>,
}

impl Default for Garden {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Garden {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Garden")
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("active", &self.active.as_ref().map(|run| run.target.as_str()))
            .field("return_code", &self.return_code.value)
            .finish()
    }
}

impl Garden {
    pub fn new() -> Self {
        Self {
            targets: IndexMap::new(),
            providers: IndexMap::new(),
            active: None,
            return_code: ReturnCode::default(),
            observer: Box::new(NullObserver),
            reports: IndexMap::new(),
        }
    }

    pub fn with_observer(observer: impl RunObserver + 'static) -> Self {
        let mut garden = Self::new();
        garden.set_observer(observer);
        garden
    }

    /// Replaces the observer receiving run notifications.
    pub fn set_observer(&mut self, observer: impl RunObserver + 'static) {
        self.observer = Box::new(observer);
    }

    // ----- registration -------------------------------------------------

    /// Registers a target built from `body`. Names must be unique.
    pub fn register_target(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        body: impl Fn(&mut Garden) -> StepResult + 'static,
    ) -> Result<TargetHandle, GardenError> {
        self.add_target(Target::new(name, description, body)?)
    }

    pub fn add_target(&mut self, target: Target) -> Result<TargetHandle, GardenError> {
        if self.targets.contains_key(target.name()) {
            return Err(GardenError::DuplicateName {
                kind: EntryKind::Target,
                name: target.name().to_string(),
            });
        }
        debug!(target_name = %target.name(), "target registered");
        let handle = target.handle();
        self.targets.insert(target.name().to_string(), target);
        Ok(handle)
    }

    pub fn register_provider(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        query: impl Fn() -> Result<String> + 'static,
    ) -> Result<(), GardenError> {
        self.add_provider(Provider::new(name, description, query)?)
    }

    pub fn add_provider(&mut self, provider: Provider) -> Result<(), GardenError> {
        if self.providers.contains_key(provider.name()) {
            return Err(GardenError::DuplicateName {
                kind: EntryKind::Provider,
                name: provider.name().to_string(),
            });
        }
        debug!(provider = %provider.name(), "provider registered");
        self.providers.insert(provider.name().to_string(), provider);
        Ok(())
    }

    /// Registered targets in registration order.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    /// Registered providers in registration order.
    pub fn providers(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    // ----- run state ----------------------------------------------------

    /// Name of the target currently being made.
    pub fn active_target(&self) -> Option<&str> {
        self.active.as_ref().map(|run| run.target.as_str())
    }

    /// Number of steps currently in flight.
    pub fn active_depth(&self) -> usize {
        self.active.as_ref().map_or(0, |run| run.stack.len())
    }

    pub fn return_code(&self) -> i32 {
        self.return_code.value
    }

    /// Sets the process return code. Only `0..=255` is accepted; the value is
    /// kept until the next top-level target starts.
    pub fn set_return_code(&mut self, code: i32) -> Result<(), GardenError> {
        if !(0..=255).contains(&code) {
            return Err(GardenError::InvalidReturnCode(code));
        }
        self.return_code = ReturnCode { value: code, pinned: true };
        Ok(())
    }

    /// Report of the most recent invocation of `name`.
    pub fn last_report(&self, name: &str) -> Option<&TargetReport> {
        self.reports.get(name)
    }

    // ----- providers ----------------------------------------------------

    pub fn run_provider(&self, name: &str) -> Result<String, GardenError> {
        let provider = self
            .providers
            .get(name)
            .ok_or_else(|| GardenError::ProviderNotFound(name.to_string()))?;
        debug!(provider = %name, "provider query started");
        provider.query().map_err(|error| GardenError::ProviderQuery {
            name: name.to_string(),
            reason: format!("{error:#}"),
        })
    }

    // ----- targets ------------------------------------------------------

    /// Makes a target as a top-level run.
    ///
    /// Aborts are absorbed here and show up in the returned report. Fails
    /// when the name is unknown or when another target is already active;
    /// use [`Garden::call_target`] from inside a body instead.
    pub fn make_target(&mut self, name: &str) -> Result<TargetReport, GardenError> {
        let target = self
            .targets
            .get(name)
            .cloned()
            .ok_or_else(|| GardenError::TargetNotFound(name.to_string()))?;
        if let Some(active) = &self.active {
            return Err(GardenError::ConcurrentActivation {
                active: active.target.clone(),
                requested: name.to_string(),
            });
        }

        self.return_code = ReturnCode::default();
        self.active = Some(ActiveRun::new(name));
        info!(target_name = %name, "target activated");
        self.observer.target_activated(target.name(), target.description());

        let started_at = Utc::now();
        let started = Instant::now();
        let body = Rc::clone(&target.body);
        let result = guarded(|| body(self));
        let (steps, aborted) = self
            .active
            .take()
            .map(|run| (run.steps, run.aborted))
            .unwrap_or_default();
        let outcome = match (aborted, Outcome::from_result(&result)) {
            // An abort discarded by the body still ends the run as aborted.
            (Some(reason), outcome) if !matches!(outcome, Outcome::Aborted(_)) => Outcome::Aborted(Some(reason)),
            (_, outcome) => outcome,
        };

        let report = TargetReport {
            target: name.to_string(),
            description: target.description().to_string(),
            outcome,
            started_at,
            elapsed: started.elapsed(),
            steps,
        };
        if !self.return_code.pinned {
            self.return_code.value = if report.succeeded() { 0 } else { DEFAULT_RETURN_CODE };
        }
        match &report.outcome {
            Outcome::Aborted(reason) => warn!(
                target_name = %name,
                reason = reason.as_deref().unwrap_or_default(),
                "target aborted"
            ),
            outcome => info!(
                target_name = %name,
                status = %outcome.status(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "target finished"
            ),
        }

        self.observer.target_deactivated(&report);
        self.reports.insert(name.to_string(), report.clone());
        Ok(report)
    }

    /// Makes each target in order.
    ///
    /// Stops at the first unknown name (returned as an error) or after the
    /// first aborted target; later names are never attempted.
    pub fn make_multiple<S: AsRef<str>>(&mut self, names: &[S]) -> Result<Vec<TargetReport>, GardenError> {
        let mut reports = Vec::with_capacity(names.len());
        for (index, name) in names.iter().enumerate() {
            let report = self.make_target(name.as_ref())?;
            let aborted = report.is_aborted();
            reports.push(report);
            if aborted {
                let remaining: Vec<&str> = names[index + 1..].iter().map(AsRef::as_ref).collect();
                if !remaining.is_empty() {
                    warn!(target_name = %name.as_ref(), ?remaining, "batch stopped after aborted target");
                }
                break;
            }
        }
        Ok(reports)
    }

    /// Invokes a target from inside a running body.
    ///
    /// While a target is active, the called target runs as an ordinary step
    /// named `TARGET: <name>` and its steps nest below it. Returns `Ok(true)`
    /// when that step succeeded and `Ok(false)` when it was skipped or failed.
    /// Outside a run this behaves like [`Garden::make_target`].
    pub fn call_target(&mut self, name: &str) -> StepResult<bool> {
        if self.active.is_none() {
            let report = self.make_target(name)?;
            return match report.outcome {
                Outcome::Aborted(reason) => Err(Signal::Abort(reason)),
                outcome => Ok(outcome == Outcome::Ok),
            };
        }
        let target = self
            .targets
            .get(name)
            .cloned()
            .ok_or_else(|| GardenError::TargetNotFound(name.to_string()))?;
        let body = Rc::clone(&target.body);
        let completed = self.run_scoped(
            format!("{SUBTARGET_PREFIX}{name}"),
            target.description().to_string(),
            true,
            move |garden| body(garden),
        )?;
        Ok(completed.is_some())
    }

    // ----- steps --------------------------------------------------------

    /// Runs `body` as a step of the active target.
    ///
    /// Returns `Ok(Some(value))` on success and `Ok(None)` when the body
    /// skipped or failed; an abort is passed on as `Err`.
    pub fn step<T>(
        &mut self,
        name: &str,
        description: &str,
        body: impl FnOnce(&mut Garden) -> StepResult<T>,
    ) -> StepResult<Option<T>> {
        self.run_scoped(name.to_string(), description.to_string(), false, body)
    }

    /// Runs a registered step function; see [`Garden::step`].
    pub fn run_step<T>(&mut self, step: &StepFn<T>) -> StepResult<Option<T>> {
        let body = Rc::clone(&step.body);
        self.run_scoped(
            step.name().to_string(),
            step.description().to_string(),
            false,
            move |garden| body(garden),
        )
    }

    fn run_scoped<T>(
        &mut self,
        name: String,
        description: String,
        subtarget: bool,
        body: impl FnOnce(&mut Garden) -> StepResult<T>,
    ) -> StepResult<Option<T>> {
        let frame = self.enter_step(name, description, subtarget)?;
        let result = guarded(|| body(self));
        self.exit_step(frame, result)
    }

    fn enter_step(&mut self, name: String, description: String, subtarget: bool) -> StepResult<StepFrame> {
        let Some(run) = self.active.as_mut() else {
            return Err(GardenError::NoActiveTarget { step: name }.into());
        };
        if let Some(reason) = &run.aborted {
            debug!(step = %name, reason = %reason, "step refused after abort");
            return Err(Signal::Abort(Some(reason.clone())));
        }
        let entry_depth = run.stack.len();
        let siblings = run.children_mut();
        let number = u32::try_from(siblings.len() + 1)
            .map_err(|_| GardenError::validation("step number", "too many sibling steps"))?;
        let record = StepRecord::new(name, description, number)?;
        let mut event = StepEvent {
            label: String::new(),
            name: record.name.clone(),
            description: record.description.clone(),
            depth: entry_depth,
            status: StepStatus::Pending,
            elapsed: Duration::ZERO,
            subtarget,
        };
        siblings.push(record);
        let index = siblings.len() - 1;
        run.stack.push(index);
        event.label = run.label();

        debug!(step = %event.name, label = %event.label, depth = entry_depth, "step entered");
        self.observer.step_started(&event);
        Ok(StepFrame {
            entry_depth,
            event,
            started: Instant::now(),
        })
    }

    fn exit_step<T>(&mut self, frame: StepFrame, result: StepResult<T>) -> StepResult<Option<T>> {
        let StepFrame {
            entry_depth,
            mut event,
            started,
        } = frame;
        event.elapsed = started.elapsed();
        event.status = Outcome::from_result(&result).status();

        if let Some(run) = self.active.as_mut() {
            run.stack.truncate(entry_depth + 1);
            if let Some(record) = run.current_mut() {
                record.status = event.status;
                record.elapsed = event.elapsed;
            }
            run.stack.truncate(entry_depth);
        }
        debug!(step = %event.name, label = %event.label, status = %event.status, "step exited");

        let outcome = match result {
            Ok(value) => Ok(Some(value)),
            Err(Signal::Skip(reason)) => {
                self.observer.step_skipped(&event, reason.as_deref());
                Ok(None)
            }
            Err(Signal::Fail(reason)) => {
                self.observer.step_failed(&event, reason.as_deref());
                Ok(None)
            }
            Err(Signal::Abort(reason)) => {
                let reason = reason
                    .filter(|reason| !reason.is_empty())
                    .unwrap_or_else(|| format!("step '{}' aborted", event.name));
                if let Some(run) = self.active.as_mut() {
                    run.aborted.get_or_insert_with(|| reason.clone());
                }
                self.observer.step_aborted(&event, Some(&reason));
                Err(Signal::Abort(Some(reason)))
            }
        };
        self.observer.step_finished(&event);
        outcome
    }
}

/// Runs a body, turning a panic into an abort carrying the panic message.
fn guarded<T>(body: impl FnOnce() -> StepResult<T>) -> StepResult<T> {
    panic::catch_unwind(AssertUnwindSafe(body)).unwrap_or_else(|payload| Err(Signal::Abort(Some(panic_message(&*payload)))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        cell::{Cell, RefCell},
        rc::Rc,
    };

    use super::*;
    use crate::signal::{abort, fail, skip};

    /// Observer appending one line per notification to a shared log.
    #[derive(Clone, Default)]
    struct RecordingObserver {
        log: Rc<RefCell<Vec<String>>>,
    }

    impl RunObserver for RecordingObserver {
        fn target_activated(&mut self, name: &str, _description: &str) {
            self.log.borrow_mut().push(format!("activate {name}"));
        }
        fn step_started(&mut self, step: &StepEvent) {
            self.log.borrow_mut().push(format!("start {} {}", step.label, step.name));
        }
        fn step_skipped(&mut self, step: &StepEvent, reason: Option<&str>) {
            self.log
                .borrow_mut()
                .push(format!("skip {} {}", step.label, reason.unwrap_or_default()));
        }
        fn step_failed(&mut self, step: &StepEvent, reason: Option<&str>) {
            self.log
                .borrow_mut()
                .push(format!("fail {} {}", step.label, reason.unwrap_or_default()));
        }
        fn step_aborted(&mut self, step: &StepEvent, reason: Option<&str>) {
            self.log
                .borrow_mut()
                .push(format!("abort {} {}", step.label, reason.unwrap_or_default()));
        }
        fn step_finished(&mut self, step: &StepEvent) {
            self.log.borrow_mut().push(format!("finish {} {}", step.label, step.status));
        }
        fn target_deactivated(&mut self, report: &TargetReport) {
            self.log
                .borrow_mut()
                .push(format!("deactivate {} {}", report.target, report.status()));
        }
    }

    fn statuses(report: &TargetReport) -> Vec<(String, StepStatus)> {
        report
            .flatten()
            .into_iter()
            .map(|entry| (entry.label, entry.record.status))
            .collect()
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut garden = Garden::new();
        garden.register_target("build", "", |_| Ok(())).expect("first target");
        let error = garden.register_target("build", "again", |_| Ok(())).expect_err("duplicate");
        assert_eq!(
            error,
            GardenError::DuplicateName {
                kind: EntryKind::Target,
                name: "build".into()
            }
        );

        garden.register_provider("version", "", || Ok("1".into())).expect("provider");
        let error = garden
            .register_provider("version", "", || Ok("2".into()))
            .expect_err("duplicate provider");
        assert!(matches!(error, GardenError::DuplicateName { kind: EntryKind::Provider, .. }));
        assert_eq!(garden.run_provider("version").expect("query"), "1");
        assert_eq!(garden.targets().count(), 1);
    }

    #[test]
    fn successful_steps_are_numbered_in_invocation_order() {
        let mut garden = Garden::new();
        garden
            .register_target("build", "", |garden| {
                for name in ["fetch", "compile", "package"] {
                    garden.step(name, "", |_| Ok(()))?;
                }
                Ok(())
            })
            .expect("register");

        let report = garden.make_target("build").expect("make");
        let numbers: Vec<u32> = report.steps.iter().map(|step| step.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(report.steps.iter().all(|step| step.status == StepStatus::Ok));
        assert_eq!(report.outcome, Outcome::Ok);
        assert_eq!(garden.return_code(), 0);
    }

    #[test]
    fn skip_only_affects_its_own_step() {
        let mut garden = Garden::new();
        garden
            .register_target("docs", "", |garden| {
                garden.step("one", "", |_| Ok(()))?;
                garden.step("two", "", |_| skip::<()>("nothing to do"))?;
                garden.step("three", "", |_| Ok(()))?;
                Ok(())
            })
            .expect("register");

        let report = garden.make_target("docs").expect("make");
        assert_eq!(
            statuses(&report),
            vec![
                ("1".to_string(), StepStatus::Ok),
                ("2".to_string(), StepStatus::Skipped),
                ("3".to_string(), StepStatus::Ok),
            ]
        );
        assert_eq!(garden.return_code(), 0);
    }

    #[test]
    fn fail_degrades_one_step_and_the_target_completes() {
        let mut garden = Garden::new();
        let reached_end = Rc::new(Cell::new(false));
        let flag = Rc::clone(&reached_end);
        garden
            .register_target("check", "", move |garden| {
                garden.step("fmt", "", |_| Ok(()))?;
                let lint = garden.step("lint", "", |_| fail::<u32>("3 warnings"))?;
                assert_eq!(lint, None);
                garden.step("test", "", |_| Ok(()))?;
                flag.set(true);
                Ok(())
            })
            .expect("register");

        let report = garden.make_target("check").expect("make");
        assert!(reached_end.get());
        assert_eq!(report.outcome, Outcome::Ok);
        assert_eq!(report.find("2").map(|step| step.status), Some(StepStatus::Failed));
        assert_eq!(report.find("3").map(|step| step.status), Some(StepStatus::Ok));
        assert_eq!(garden.return_code(), DEFAULT_RETURN_CODE);
    }

    #[test]
    fn unrecognized_error_aborts_every_enclosing_step() {
        let mut garden = Garden::new();
        garden
            .register_target("release", "", |garden| {
                garden.step("prepare", "", |_| Ok(()))?;
                garden.step("publish", "", |garden| {
                    garden.step("upload", "", |_| -> StepResult {
                        Err::<(), _>(anyhow::anyhow!("connection refused"))?;
                        Ok(())
                    })?;
                    garden.step("announce", "", |_| Ok(()))?;
                    Ok(())
                })?;
                garden.step("cleanup", "", |_| Ok(()))?;
                Ok(())
            })
            .expect("register");

        let report = garden.make_target("release").expect("make");
        assert_eq!(
            statuses(&report),
            vec![
                ("1".to_string(), StepStatus::Ok),
                ("2".to_string(), StepStatus::Aborted),
                ("2.1".to_string(), StepStatus::Aborted),
            ]
        );
        assert_eq!(report.outcome, Outcome::Aborted(Some("connection refused".into())));
        assert_eq!(garden.active_target(), None);
        assert_eq!(garden.active_depth(), 0);
        assert_eq!(garden.return_code(), DEFAULT_RETURN_CODE);

        let summary = report.summary();
        let last = summary.rows.last().expect("aborted row");
        assert_eq!((last.name.as_str(), last.status), ("release", StepStatus::Aborted));
    }

    #[test]
    fn abort_without_reason_gets_a_generic_message() {
        let mut garden = Garden::new();
        garden
            .register_target("deploy", "", |garden| {
                garden.step("push", "", |_| Err::<(), _>(Signal::Abort(None)))?;
                Ok(())
            })
            .expect("register");
        let report = garden.make_target("deploy").expect("make");
        assert_eq!(report.outcome, Outcome::Aborted(Some("step 'push' aborted".into())));
    }

    #[test]
    fn panics_inside_steps_become_aborts() {
        let mut garden = Garden::new();
        garden
            .register_target("explode", "", |garden| {
                garden.step("fuse", "", |_| -> StepResult { panic!("kaboom") })?;
                Ok(())
            })
            .expect("register");

        let report = garden.make_target("explode").expect("make");
        assert_eq!(report.outcome, Outcome::Aborted(Some("panicked: kaboom".into())));
        assert_eq!(report.steps[0].status, StepStatus::Aborted);
        assert_eq!(garden.active_target(), None);
    }

    #[test]
    fn active_step_stack_is_restored_after_each_step() {
        let mut garden = Garden::new();
        let depths = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&depths);
        garden
            .register_target("nest", "", move |garden| {
                seen.borrow_mut().push(garden.active_depth());
                garden.step("outer", "", |garden| {
                    seen.borrow_mut().push(garden.active_depth());
                    garden.step("inner", "", |garden| {
                        seen.borrow_mut().push(garden.active_depth());
                        skip::<()>("done early")
                    })?;
                    seen.borrow_mut().push(garden.active_depth());
                    fail::<()>("outer failed")
                })?;
                seen.borrow_mut().push(garden.active_depth());
                Ok(())
            })
            .expect("register");

        let report = garden.make_target("nest").expect("make");
        assert_eq!(*depths.borrow(), vec![0, 1, 2, 1, 0]);
        assert_eq!(report.find("1").map(|step| step.status), Some(StepStatus::Failed));
        assert_eq!(report.find("1.1").map(|step| step.status), Some(StepStatus::Skipped));
    }

    #[test]
    fn nested_target_runs_as_a_numbered_step() {
        let mut garden = Garden::new();
        garden
            .register_target("lint", "Lint sources", |garden| {
                garden.step("clippy", "", |_| Ok(()))?;
                garden.step("fmt", "", |_| Ok(()))?;
                Ok(())
            })
            .expect("register lint");
        garden
            .register_target("ci", "", |garden| {
                garden.step("build", "", |_| Ok(()))?;
                assert!(garden.call_target("lint")?);
                garden.step("test", "", |_| Ok(()))?;
                Ok(())
            })
            .expect("register ci");

        let report = garden.make_target("ci").expect("make");
        let labels: Vec<(String, String)> = report
            .flatten()
            .into_iter()
            .map(|entry| (entry.label, entry.record.name.clone()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("1".to_string(), "build".to_string()),
                ("2".to_string(), "TARGET: lint".to_string()),
                ("2.1".to_string(), "clippy".to_string()),
                ("2.2".to_string(), "fmt".to_string()),
                ("3".to_string(), "test".to_string()),
            ]
        );
        assert_eq!(report.find("2").map(|step| step.description.as_str()), Some("Lint sources"));
    }

    #[test]
    fn make_target_refuses_a_second_activation() {
        let mut garden = Garden::new();
        let captured: Rc<RefCell<Option<GardenError>>> = Rc::default();
        let slot = Rc::clone(&captured);
        garden.register_target("other", "", |_| Ok(())).expect("register other");
        garden
            .register_target("outer", "", move |garden| {
                *slot.borrow_mut() = garden.make_target("other").err();
                Ok(())
            })
            .expect("register outer");

        garden.make_target("outer").expect("make");
        assert_eq!(
            *captured.borrow(),
            Some(GardenError::ConcurrentActivation {
                active: "outer".into(),
                requested: "other".into()
            })
        );
        assert!(garden.last_report("other").is_none());
    }

    #[test]
    fn make_multiple_stops_after_an_aborted_target() {
        let mut garden = Garden::new();
        let b_ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&b_ran);
        garden
            .register_target("a", "", |garden| {
                garden.step("explode", "", |_| abort::<()>("stop here"))?;
                Ok(())
            })
            .expect("register a");
        garden
            .register_target("b", "", move |_| {
                flag.set(true);
                Ok(())
            })
            .expect("register b");

        let reports = garden.make_multiple(&["a", "b"]).expect("batch");
        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_aborted());
        assert!(!b_ran.get());
    }

    #[test]
    fn make_multiple_surfaces_unknown_names() {
        let mut garden = Garden::new();
        garden.register_target("a", "", |_| Ok(())).expect("register");
        let error = garden.make_multiple(&["a", "missing", "a"]).expect_err("unknown target");
        assert_eq!(error, GardenError::TargetNotFound("missing".into()));
        assert_eq!(error.to_string(), "The target 'missing' is not found!");
    }

    #[test]
    fn return_code_is_reset_for_every_top_level_run() {
        let mut garden = Garden::new();
        garden
            .register_target("pinned", "", |garden| {
                garden.set_return_code(42)?;
                Ok(())
            })
            .expect("register pinned");
        garden.register_target("plain", "", |_| Ok(())).expect("register plain");

        garden.make_target("pinned").expect("make pinned");
        assert_eq!(garden.return_code(), 42);
        garden.make_target("plain").expect("make plain");
        assert_eq!(garden.return_code(), 0);

        assert_eq!(garden.set_return_code(256), Err(GardenError::InvalidReturnCode(256)));
        assert_eq!(garden.set_return_code(-1), Err(GardenError::InvalidReturnCode(-1)));
    }

    #[test]
    fn signals_raised_by_the_target_body_set_the_outcome() {
        let mut garden = Garden::new();
        garden
            .register_target("optional", "", |garden| {
                garden.step("detect", "", |_| Ok(()))?;
                skip("not configured")
            })
            .expect("register");
        let report = garden.make_target("optional").expect("make");
        assert_eq!(report.outcome, Outcome::Skipped(Some("not configured".into())));
        assert_eq!(report.steps.len(), 1);
        assert!(!report.summary().is_aborted());
    }

    #[test]
    fn steps_outside_a_target_are_rejected() {
        let mut garden = Garden::new();
        let error = garden.step("loose", "", |_| Ok(())).expect_err("no active target");
        assert!(error.is_abort());
        assert_eq!(error.reason(), Some("step 'loose' was invoked outside of a running target"));
    }

    #[test]
    fn step_values_are_returned_to_the_caller() {
        let mut garden = Garden::new();
        let version = StepFn::new("read-version", "Read the version", |_garden: &mut Garden| Ok(String::from("1.2.3")))
            .expect("step fn");
        let seen: Rc<RefCell<Option<String>>> = Rc::default();
        let slot = Rc::clone(&seen);
        garden
            .register_target("tag", "", move |garden| {
                *slot.borrow_mut() = garden.run_step(&version)?;
                Ok(())
            })
            .expect("register");

        garden.make_target("tag").expect("make");
        assert_eq!(seen.borrow().as_deref(), Some("1.2.3"));
        assert_eq!(garden.last_report("tag").map(|report| report.steps[0].name.as_str()), Some("read-version"));
    }

    #[test]
    fn return_code_is_back_to_default_while_the_next_target_runs() {
        let mut garden = Garden::new();
        let seen = Rc::new(Cell::new(None));
        let slot = Rc::clone(&seen);
        garden
            .register_target("pinned", "", |garden| {
                garden.set_return_code(42)?;
                Ok(())
            })
            .expect("register pinned");
        garden
            .register_target("observe", "", move |garden| {
                slot.set(Some(garden.return_code()));
                Ok(())
            })
            .expect("register observe");

        garden.make_target("pinned").expect("make pinned");
        assert_eq!(garden.return_code(), 42);
        garden.make_target("observe").expect("make observe");
        assert_eq!(seen.get(), Some(DEFAULT_RETURN_CODE));
    }

    #[test]
    fn discarded_abort_still_ends_the_run() {
        let mut garden = Garden::new();
        let later: Rc<RefCell<Option<StepResult<Option<()>>>>> = Rc::default();
        let slot = Rc::clone(&later);
        garden
            .register_target("stubborn", "", move |garden| {
                let _ = garden.step("a", "", |_| abort::<()>("boom"));
                *slot.borrow_mut() = Some(garden.step("b", "", |_| Ok(())));
                Ok(())
            })
            .expect("register");

        let report = garden.make_target("stubborn").expect("make");
        assert_eq!(report.outcome, Outcome::Aborted(Some("boom".into())));
        assert_eq!(statuses(&report), vec![("1".to_string(), StepStatus::Aborted)]);
        assert_eq!(*later.borrow(), Some(Err(Signal::abort("boom"))));
        assert!(report.summary().is_aborted());
        assert_eq!(garden.return_code(), DEFAULT_RETURN_CODE);

        // The latch belongs to the run, not to the garden.
        garden
            .register_target("fresh", "", |garden| {
                garden.step("ok", "", |_| Ok(()))?;
                Ok(())
            })
            .expect("register fresh");
        assert_eq!(garden.make_target("fresh").expect("make fresh").outcome, Outcome::Ok);
    }

    #[test]
    fn target_handle_nests_inside_a_running_body() {
        let mut garden = Garden::new();
        let inner = garden
            .register_target("inner", "Inner work", |garden| {
                garden.step("work", "", |_| Ok(()))?;
                Ok(())
            })
            .expect("register inner");
        let nested = inner.clone();
        garden
            .register_target("outer", "", move |garden| {
                assert!(nested.make(garden)?);
                Ok(())
            })
            .expect("register outer");

        let report = garden.make_target("outer").expect("make outer");
        let labels: Vec<(String, String)> = report
            .flatten()
            .into_iter()
            .map(|entry| (entry.label, entry.record.name.clone()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("1".to_string(), "TARGET: inner".to_string()),
                ("1.1".to_string(), "work".to_string()),
            ]
        );
        assert_eq!(report.outcome, Outcome::Ok);
        assert!(garden.last_report("inner").is_none());

        assert_eq!(inner.make(&mut garden), Ok(true));
        assert!(garden.last_report("inner").is_some());
    }

    #[test]
    fn observer_sees_the_run_in_order() {
        let observer = RecordingObserver::default();
        let log = Rc::clone(&observer.log);
        let mut garden = Garden::with_observer(observer);
        garden
            .register_target("build", "", |garden| {
                garden.step("compile", "", |_| Ok(()))?;
                garden.step("docs", "", |_| skip::<()>("no docs"))?;
                garden.step("lint", "", |_| fail::<()>("warnings"))?;
                Ok(())
            })
            .expect("register");

        garden.make_target("build").expect("make");
        assert_eq!(
            *log.borrow(),
            vec![
                "activate build",
                "start 1 compile",
                "finish 1 OK",
                "start 2 docs",
                "skip 2 no docs",
                "finish 2 Skipped",
                "start 3 lint",
                "fail 3 warnings",
                "finish 3 Failed",
                "deactivate build OK",
            ]
        );
    }

    #[test]
    fn providers_answer_queries() {
        let mut garden = Garden::new();
        garden
            .register_provider("version", "Project version", || Ok("1.0.0".to_string()))
            .expect("register");
        garden
            .register_provider("broken", "", || anyhow::bail!("no git repository"))
            .expect("register broken");

        assert_eq!(garden.run_provider("version").expect("query"), "1.0.0");
        assert_eq!(
            garden.run_provider("missing"),
            Err(GardenError::ProviderNotFound("missing".into()))
        );
        assert!(matches!(
            garden.run_provider("broken"),
            Err(GardenError::ProviderQuery { reason, .. }) if reason == "no git repository"
        ));
        assert_eq!(garden.providers().map(Provider::name).collect::<Vec<_>>(), vec!["version", "broken"]);
    }
}
