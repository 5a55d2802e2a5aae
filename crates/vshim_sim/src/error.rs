//! Session error types.
//!
//! All errors that can occur while creating, stepping, accessing, or
//! destroying a simulation session are represented as variants of
//! [`SimError`].

use std::io;
use std::path::PathBuf;

use crate::session::SessionState;

/// Errors that can occur during session setup or execution.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// No port with this name exists on the model.
    #[error("unknown port '{0}'")]
    UnknownPort(String),

    /// A port index is outside the model's port table.
    #[error("port index {index} out of range ({count} ports)")]
    PortOutOfRange {
        /// The requested index.
        index: u32,
        /// Number of ports on the model.
        count: usize,
    },

    /// A value has more significant bits than the port holds.
    #[error("value with {value_bits} significant bits does not fit port '{port}' ({width} bits)")]
    ValueTooWide {
        /// Port name.
        port: String,
        /// Port width.
        width: u32,
        /// Significant bits of the rejected value.
        value_bits: u32,
    },

    /// A port has no bits and cannot be stored or traced.
    #[error("port '{0}' has zero width")]
    ZeroWidthPort(String),

    /// An output port was written.
    #[error("port '{0}' is an output and cannot be written")]
    ReadOnlyPort(String),

    /// An operation was attempted in a state that does not allow it.
    #[error("cannot {operation} a session in state {state}")]
    InvalidState {
        /// The attempted operation.
        operation: &'static str,
        /// The session state at the time.
        state: SessionState,
    },

    /// The configured trace clock cannot drive the trace timestamp.
    #[error("invalid trace clock '{name}': {reason}")]
    InvalidClock {
        /// Clock port name.
        name: String,
        /// Why the clock was rejected.
        reason: String,
    },

    /// The declared ports disagree with the ports the model reports.
    #[error("port mismatch: {reason}")]
    PortMismatch {
        /// Description of the mismatch.
        reason: String,
    },

    /// No reference model with this name exists.
    #[error("unknown reference model '{0}'")]
    UnknownReferenceModel(String),

    /// A model library could not be loaded or is missing a symbol.
    #[error("model library {}: {reason}", path.display())]
    Library {
        /// Library path.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// A signal reference could not be resolved by the trace writer.
    #[error("invalid signal reference: {reason}")]
    InvalidSignalRef {
        /// Description of why the signal reference is invalid.
        reason: String,
    },

    /// An I/O error occurred while writing trace data.
    #[error("trace I/O error: {0}")]
    TraceIo(#[from] io::Error),
}
