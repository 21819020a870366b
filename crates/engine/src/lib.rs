//! # Fruit Engine
//!
//! Registration and execution of named targets built from nested steps.
//!
//! A host creates a [`Garden`], registers targets and providers, either
//! through the builder API or by loading a `fruitconfig.yaml` with
//! [`load_into`], and then makes targets by name. Every step records its
//! status and timing into a tree returned as a [`TargetReport`].
//!
//! ## Usage
//!
//! ```rust
//! use fruit_engine::{Garden, Outcome, skip};
//!
//! let mut garden = Garden::new();
//! garden.register_target("lint", "Run linters", |garden| {
//!     garden.step("clippy", "", |_| Ok(()))?;
//!     Ok(())
//! })?;
//! garden.register_target("ci", "Continuous integration", |garden| {
//!     garden.step("build", "Compile", |_| Ok(()))?;
//!     garden.step("docs", "Documentation", |_| skip::<()>("no docs"))?;
//!     garden.call_target("lint")?;
//!     Ok(())
//! })?;
//!
//! let report = garden.make_target("ci")?;
//! assert_eq!(report.outcome, Outcome::Ok);
//! assert_eq!(report.find("3.1").map(|step| step.name.as_str()), Some("clippy"));
//! assert_eq!(garden.return_code(), 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - **`signal`**: the `Skip`/`Fail`/`Abort` control-flow taxonomy
//! - **`step`**: step records and reusable step functions
//! - **`target`**: targets, handles and run reports
//! - **`provider`**: named information queries
//! - **`garden`**: the registry and execution context
//! - **`observer`**: run notifications for console or other front ends
//! - **`config`**: YAML configuration loading

pub mod config;
pub mod error;
pub mod garden;
pub mod observer;
pub mod provider;
pub mod signal;
pub mod step;
pub mod target;

pub use config::{
    ALT_CONFIG_FILE_NAME, CONFIG_FILE_NAME, CONFIG_PATH_ENV, ConfigError, FruitConfig, LoadedConfig, ProviderConfig, StepConfig,
    TargetConfig, default_config_path, load_config, load_into, resolve_config_path,
};
pub use error::{EntryKind, GardenError};
pub use garden::{DEFAULT_RETURN_CODE, Garden};
pub use observer::{NullObserver, RunObserver};
pub use provider::{Provider, ProviderQuery};
pub use signal::{Outcome, Signal, StepResult, abort, fail, skip};
pub use step::{SUBTARGET_PREFIX, StepEvent, StepFn, StepRecord};
pub use target::{FlatStep, Target, TargetBody, TargetHandle, TargetReport};
