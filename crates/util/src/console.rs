//! # Console Output
//!
//! Plain-text rendering for make runs: echo/error helpers, step and
//! target headers, and the summary table printed after every target.
//!
//! All `format_*` and `render_*` functions are pure and return strings so they
//! can be tested; the printing helpers are thin wrappers over `println!`.

use fruit_types::{RunSummary, StepStatus};
use unicode_width::UnicodeWidthStr;

pub const ICON_TARGET: &str = "🍉";
pub const ICON_SUBTARGET: &str = "🍎";
pub const ICON_STEP: &str = "🥝";
pub const ICON_OK: &str = "✅";
pub const ICON_SKIP: &str = "⏭";
pub const ICON_ERR: &str = "❌";
pub const ICON_BANANA: &str = "🍌";
pub const ICON_UNKNOWN: &str = "❔";

/// Width used when `COLUMNS` is unset or unparsable.
const DEFAULT_WIDTH: usize = 80;
const MIN_WIDTH: usize = 20;
/// Gap between table columns.
const COLUMN_GAP: &str = "  ";

/// Prints a line to stdout.
pub fn echo(message: impl AsRef<str>) {
    println!("{}", message.as_ref());
}

/// Prints an error line to stderr.
pub fn error(message: impl AsRef<str>) {
    eprintln!("{}", message.as_ref());
}

/// Terminal width taken from `COLUMNS`.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(DEFAULT_WIDTH)
        .max(MIN_WIDTH)
}

/// A horizontal rule `width` characters wide.
pub fn rule(ch: char, width: usize) -> String {
    std::iter::repeat_n(ch, width).collect()
}

pub fn status_icon(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Ok => ICON_OK,
        StepStatus::Skipped => ICON_SKIP,
        StepStatus::Failed | StepStatus::Aborted => ICON_ERR,
        StepStatus::Pending => ICON_UNKNOWN,
    }
}

/// Header printed when a top-level target starts, or a sub-target when nested.
pub fn format_target_header(name: &str, nested: bool, width: usize) -> String {
    if nested {
        format!("{ICON_SUBTARGET} Making sub-target '{name}' ...\n{}", rule('>', width.saturating_sub(5)))
    } else {
        format!("{ICON_TARGET} Making '{name}' ...\n{}", rule('=', width.saturating_sub(10)))
    }
}

/// Header printed when a step starts, e.g. `🥝 Step 1.2: compile`.
pub fn format_step_header(label: &str, name: &str, width: usize) -> String {
    format!("{ICON_STEP} Step {label}: {name}\n{}", rule('-', width.saturating_sub(5)))
}

pub fn format_skip_message(reason: Option<&str>) -> String {
    format!("{ICON_SKIP}  The step was skipped. {}", reason.unwrap_or_default())
        .trim_end()
        .to_string()
}

pub fn format_fail_message(reason: Option<&str>) -> String {
    format!("{ICON_BANANA}  The step failed! {}", reason.unwrap_or_default())
        .trim_end()
        .to_string()
}

pub fn format_abort_message(reason: Option<&str>) -> String {
    match reason {
        Some(reason) if !reason.is_empty() => format!("The make process was aborted! Reason: {reason}"),
        _ => "The make process was aborted!".to_string(),
    }
}

/// Renders rows as a plain table with a dashed underline below the headers.
///
/// Columns are padded by display width so emoji icons line up.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|header| header.width()).collect();
    for row in rows {
        for (index, cell) in row.iter().take(column_count).enumerate() {
            widths[index] = widths[index].max(cell.width());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_line(headers.iter().copied(), &widths));
    lines.push(widths.iter().map(|width| rule('-', *width)).collect::<Vec<_>>().join(COLUMN_GAP));
    for row in rows {
        let cells = row.iter().map(String::as_str).chain(std::iter::repeat(""));
        lines.push(format_line(cells, &widths));
    }
    lines.join("\n")
}

fn format_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let line = cells
        .zip(widths)
        .map(|(cell, width)| pad_to_width(cell, *width))
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    line.trim_end().to_string()
}

fn pad_to_width(cell: &str, width: usize) -> String {
    let padding = width.saturating_sub(cell.width());
    format!("{cell}{}", " ".repeat(padding))
}

/// Formats elapsed seconds the way the summary table shows them.
pub fn format_elapsed(seconds: Option<f64>) -> String {
    match seconds {
        Some(seconds) => format!("{seconds:.3}"),
        None => "N/A".to_string(),
    }
}

/// Renders the summary block printed after a target finished.
pub fn render_summary(summary: &RunSummary) -> String {
    let rows: Vec<Vec<String>> = summary
        .rows
        .iter()
        .map(|row| {
            let indent = "  ".repeat(row.depth);
            let name = if row.label.is_empty() {
                row.name.clone()
            } else {
                format!("{indent}{} {}", row.label, row.name)
            };
            vec![
                status_icon(row.status).to_string(),
                row.status.label().to_string(),
                format_elapsed(row.elapsed_seconds),
                name,
            ]
        })
        .collect();

    format!(
        "\nSummary of target '{}':\n\n{}",
        summary.target,
        render_table(&["", "Status", "Time", "Name"], &rows)
    )
}
