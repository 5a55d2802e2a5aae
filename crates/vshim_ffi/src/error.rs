//! Errors surfaced through `vshim_last_error`.

use vshim_config::ConfigError;
use vshim_sim::SimError;

/// Errors that can occur in a C ABI call.
#[derive(Debug, thiserror::Error)]
pub enum FfiError {
    /// A null session handle was passed.
    #[error("null session handle")]
    NullHandle,

    /// A null or non-UTF-8 string argument was passed.
    #[error("invalid string argument: {0}")]
    InvalidString(&'static str),

    /// A null output pointer was passed.
    #[error("null output pointer")]
    NullOutput,

    /// The configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session rejected the operation.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// A Rust panic was caught at the boundary.
    #[error("internal panic: {0}")]
    Panic(String),
}
