//! Description of the wrapper to generate.

use std::collections::HashSet;

use vshim_common::{is_c_identifier, PortSpec};
use vshim_config::{ShimConfig, DEFAULT_TICK};

use crate::error::CodegenError;

/// Everything needed to render a wrapper for one compiled model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrapperSpec {
    /// Model type name; the compiled class is `V<model_name>`.
    pub model_name: String,
    /// Ports exposed as pointer symbols, in declaration order.
    pub ports: Vec<PortSpec>,
    /// Compile simulator-side VCD tracing into the wrapper.
    pub dump_vcd: bool,
    /// Trace file prefix; the wrapper writes `<prefix>.<model>.vcd`.
    pub vcd_prefix: String,
    /// Port whose transitions advance the trace time.
    pub clock_port: Option<String>,
    /// Trace time increment per clock transition.
    pub tick_increment: u64,
    /// Leave the model allocated in `destroy_model`.
    pub leak_model: bool,
}

impl WrapperSpec {
    /// A spec with tracing off, clock `clk`, tick 5, and the model released
    /// on destroy.
    pub fn new(model_name: impl Into<String>, ports: Vec<PortSpec>) -> Self {
        Self {
            model_name: model_name.into(),
            ports,
            dump_vcd: false,
            vcd_prefix: "trace".to_string(),
            clock_port: Some("clk".to_string()),
            tick_increment: DEFAULT_TICK,
            leak_model: false,
        }
    }

    /// Builds a spec from a loaded configuration.
    pub fn from_config(config: &ShimConfig) -> Self {
        let clock = &config.trace.clock;
        Self {
            model_name: config.model.name.clone(),
            ports: config.ports.clone(),
            dump_vcd: config.codegen.dump_vcd,
            vcd_prefix: config.trace.prefix.clone(),
            clock_port: (!clock.is_empty()).then(|| clock.clone()),
            tick_increment: config.trace.tick,
            leak_model: config.session.leak_model_on_destroy,
        }
    }

    /// Checks that the spec renders to valid C++.
    pub fn validate(&self) -> Result<(), CodegenError> {
        if !is_c_identifier(&self.model_name) {
            return Err(CodegenError::InvalidIdentifier(self.model_name.clone()));
        }
        if self.ports.is_empty() {
            return Err(CodegenError::NoPorts(self.model_name.clone()));
        }
        let mut seen = HashSet::new();
        for port in &self.ports {
            if !is_c_identifier(&port.name) {
                return Err(CodegenError::InvalidIdentifier(port.name.clone()));
            }
            if port.width == 0 {
                return Err(CodegenError::ZeroWidth(port.name.clone()));
            }
            if !seen.insert(port.name.as_str()) {
                return Err(CodegenError::DuplicatePort(port.name.clone()));
            }
        }
        if self.dump_vcd {
            if self.tick_increment == 0 {
                return Err(CodegenError::ZeroTick);
            }
            if self.vcd_prefix.is_empty()
                || self
                    .vcd_prefix
                    .chars()
                    .any(|c| c == '"' || c == '\\' || c.is_control())
            {
                return Err(CodegenError::InvalidPrefix(self.vcd_prefix.clone()));
            }
            if let Some(clock) = &self.clock_port {
                let port = self
                    .ports
                    .iter()
                    .find(|p| &p.name == clock)
                    .ok_or_else(|| CodegenError::InvalidClock {
                        name: clock.clone(),
                        reason: "no such port".to_string(),
                    })?;
                if port.width != 1 {
                    return Err(CodegenError::InvalidClock {
                        name: clock.clone(),
                        reason: format!("clock must be 1 bit wide, port is {} bits", port.width),
                    });
                }
            }
        }
        Ok(())
    }
}
