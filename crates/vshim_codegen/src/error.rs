//! Code generation error types.

use std::io;

/// Errors that can occur while validating or writing a wrapper.
#[derive(Debug, thiserror::Error)]
pub enum CodegenError {
    /// A model or port name is not a valid C identifier.
    #[error("'{0}' is not a valid C identifier")]
    InvalidIdentifier(String),

    /// A port has zero width.
    #[error("port '{0}' has zero width")]
    ZeroWidth(String),

    /// Two ports share a name.
    #[error("duplicate port '{0}'")]
    DuplicatePort(String),

    /// The wrapper would expose no ports.
    #[error("model {0} declares no ports")]
    NoPorts(String),

    /// The clock port cannot drive the trace timestamp.
    #[error("invalid clock port '{name}': {reason}")]
    InvalidClock {
        /// Clock port name.
        name: String,
        /// Why the clock was rejected.
        reason: String,
    },

    /// The tick increment is zero.
    #[error("tick increment must be non-zero")]
    ZeroTick,

    /// The VCD prefix would break the generated string literal.
    #[error("invalid VCD prefix '{0}'")]
    InvalidPrefix(String),

    /// Writing a generated file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            CodegenError::InvalidIdentifier("9a".into()).to_string(),
            "'9a' is not a valid C identifier"
        );
        assert_eq!(
            CodegenError::InvalidClock {
                name: "clk".into(),
                reason: "no such port".into()
            }
            .to_string(),
            "invalid clock port 'clk': no such port"
        );
        assert_eq!(CodegenError::ZeroTick.to_string(), "tick increment must be non-zero");
    }
}
