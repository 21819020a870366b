//! Errors surfaced by registration and lookup operations of the [`Garden`](crate::Garden).

use std::fmt;

use thiserror::Error;

/// Kind of registry entry, used in duplicate-name errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Target,
    Provider,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Target => f.write_str("target"),
            Self::Provider => f.write_str("provider"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GardenError {
    /// Malformed registration input (empty name, zero step number, ...).
    #[error("invalid {subject}: {reason}")]
    Validation { subject: &'static str, reason: String },
    #[error("a {kind} named '{name}' is already registered")]
    DuplicateName { kind: EntryKind, name: String },
    #[error("The target '{0}' is not found!")]
    TargetNotFound(String),
    #[error("The provider '{0}' is not found!")]
    ProviderNotFound(String),
    /// A top-level invocation was requested while another target is running.
    #[error("cannot activate target '{requested}' while target '{active}' is running")]
    ConcurrentActivation { active: String, requested: String },
    #[error("step '{step}' was invoked outside of a running target")]
    NoActiveTarget { step: String },
    #[error("return code {0} is outside the range 0..=255")]
    InvalidReturnCode(i32),
    #[error("provider '{name}' failed: {reason}")]
    ProviderQuery { name: String, reason: String },
}

impl GardenError {
    pub(crate) fn validation(subject: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            subject,
            reason: reason.into(),
        }
    }
}

/// Checks that a registry name is usable from the command line.
pub(crate) fn validate_name(subject: &'static str, name: &str) -> Result<(), GardenError> {
    if name.trim().is_empty() {
        return Err(GardenError::validation(subject, "name must not be empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(GardenError::validation(subject, format!("'{name}' must not contain whitespace")));
    }
    Ok(())
}
