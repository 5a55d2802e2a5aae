//! Parsing and validation of `vshim.toml` configuration files.
//!
//! This crate reads the shim configuration and produces a strongly-typed
//! [`ShimConfig`], then resolves it into a [`SessionPlan`] with absolute
//! paths, a concrete model source, and the optional trace settings.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE_NAME};
pub use resolve::{resolve_session_plan, trace_file_name, ModelSource, SessionPlan, TracePlan};
pub use types::*;
