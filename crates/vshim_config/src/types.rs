//! Configuration types deserialized from `vshim.toml`.

use serde::Deserialize;
use vshim_common::PortSpec;

/// Default tick increment applied to the trace timestamp per clock transition.
pub const DEFAULT_TICK: u64 = 5;

/// The top-level shim configuration parsed from `vshim.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShimConfig {
    /// The model to drive and where it comes from.
    pub model: ModelConfig,
    /// Exposed ports, in declaration order. May be omitted for reference
    /// models, which report their own ports.
    #[serde(default)]
    pub ports: Vec<PortSpec>,
    /// Waveform trace settings.
    #[serde(default)]
    pub trace: TraceConfig,
    /// Session lifecycle settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Wrapper generation settings.
    #[serde(default)]
    pub codegen: CodegenConfig,
}

/// Identity and source of the compiled model.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Model type name (the `V<name>` class generated by the simulator).
    pub name: String,
    /// Path to a shared library built from the generated wrapper.
    #[serde(default)]
    pub library: Option<String>,
    /// Name of a built-in reference model.
    #[serde(default)]
    pub reference: Option<String>,
    /// Width parameter passed to parameterized reference models.
    #[serde(default = "default_reference_width")]
    pub width: u32,
}

/// Waveform trace settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TraceConfig {
    /// Whether sessions write a VCD trace.
    #[serde(default)]
    pub enabled: bool,
    /// File name prefix; the trace is written to `<prefix>.<model>.vcd`.
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Output directory for the trace file, relative to the config file.
    #[serde(default = "default_dir")]
    pub dir: String,
    /// Port whose transitions advance the trace timestamp. Empty disables
    /// clock tracking.
    #[serde(default = "default_clock")]
    pub clock: String,
    /// Timestamp increment per observed clock transition.
    #[serde(default = "default_tick")]
    pub tick: u64,
    /// VCD `$timescale` value.
    #[serde(default = "default_timescale")]
    pub timescale: String,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: default_prefix(),
            dir: default_dir(),
            clock: default_clock(),
            tick: DEFAULT_TICK,
            timescale: default_timescale(),
        }
    }
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Leave the model allocated on destroy instead of releasing it.
    ///
    /// Some host interpreters crash when the model is freed during their own
    /// teardown; this keeps the model alive for the rest of the process.
    #[serde(default)]
    pub leak_model_on_destroy: bool,
}

/// Wrapper generation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CodegenConfig {
    /// Compile simulator-side VCD tracing into the generated wrapper.
    #[serde(default)]
    pub dump_vcd: bool,
    /// Output directory for generated sources, relative to the config file.
    #[serde(default = "default_dir")]
    pub out_dir: String,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            dump_vcd: false,
            out_dir: default_dir(),
        }
    }
}

fn default_reference_width() -> u32 {
    1
}

fn default_prefix() -> String {
    "trace".to_string()
}

fn default_dir() -> String {
    ".".to_string()
}

fn default_clock() -> String {
    "clk".to_string()
}

fn default_tick() -> u64 {
    DEFAULT_TICK
}

fn default_timescale() -> String {
    "1ps".to_string()
}
