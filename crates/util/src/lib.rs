//! Helpers shared by the Fruit engine and CLI: console output, shell command
//! execution and path handling.

pub mod console;
pub mod path_processing;
pub mod shell;

pub use console::{echo, error, render_summary, render_table};
pub use path_processing::expand_tilde;
pub use shell::{ShellError, ShellOutput, run_captured, run_streaming};
