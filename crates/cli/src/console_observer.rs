//! Renders run notifications to the terminal.

use std::io::{self, Stderr, Stdout, Write};

use fruit_engine::{Outcome, RunObserver, SUBTARGET_PREFIX, StepEvent, TargetReport};
use fruit_util::console;

/// Prints target and step headers, skip notes and the final summary to `out`;
/// failures and aborts go to `err`.
#[derive(Debug)]
pub struct ConsoleObserver<O = Stdout, E = Stderr> {
    width: usize,
    out: O,
    err: E,
}

impl ConsoleObserver {
    pub fn new(width: usize) -> Self {
        Self::with_writers(width, io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> ConsoleObserver<O, E> {
    pub fn with_writers(width: usize, out: O, err: E) -> Self {
        Self { width, out, err }
    }

    fn step_header(&self, step: &StepEvent) -> String {
        if step.subtarget {
            let name = step.name.strip_prefix(SUBTARGET_PREFIX).unwrap_or(&step.name);
            console::format_target_header(name, true, self.width)
        } else {
            console::format_step_header(&step.label, &step.name, self.width)
        }
    }

    // Console output is best effort; a closed pipe must not abort the run.
    fn echo(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
    }

    fn error(&mut self, line: &str) {
        let _ = writeln!(self.err, "{line}");
    }
}

impl<O: Write, E: Write> RunObserver for ConsoleObserver<O, E> {
    fn target_activated(&mut self, name: &str, _description: &str) {
        let header = console::format_target_header(name, false, self.width);
        self.echo(&header);
    }

    fn step_started(&mut self, step: &StepEvent) {
        let header = self.step_header(step);
        self.echo(&header);
    }

    fn step_skipped(&mut self, _step: &StepEvent, reason: Option<&str>) {
        self.echo(&console::format_skip_message(reason));
    }

    fn step_failed(&mut self, _step: &StepEvent, reason: Option<&str>) {
        self.error(&console::format_fail_message(reason));
    }

    fn step_finished(&mut self, _step: &StepEvent) {
        self.echo("");
    }

    fn target_deactivated(&mut self, report: &TargetReport) {
        if let Outcome::Aborted(reason) = &report.outcome {
            self.error(&console::format_abort_message(reason.as_deref()));
        }
        self.echo(&console::render_summary(&report.summary()));
    }
}
