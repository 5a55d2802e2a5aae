//! Session plan resolution: turning a validated config into concrete settings.

use crate::error::ConfigError;
use crate::loader::check_single_trace_writer;
use crate::types::ShimConfig;
use std::path::{Path, PathBuf};
use vshim_common::PortSpec;

/// Where the model driven by a session comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A shared library built from the generated wrapper.
    Library(PathBuf),
    /// A built-in reference model.
    Reference {
        /// Reference model name (e.g. `"full_adder"`).
        name: String,
        /// Width parameter for parameterized models.
        width: u32,
    },
}

/// Resolved trace settings for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracePlan {
    /// Absolute or base-relative path of the VCD file.
    pub path: PathBuf,
    /// Clock port name, or `None` to keep the timestamp fixed.
    pub clock: Option<String>,
    /// Timestamp increment per observed clock transition.
    pub tick: u64,
    /// VCD `$timescale` value.
    pub timescale: String,
    /// Name of the top-level `$scope`: the configured model name.
    pub scope: String,
}

/// A fully resolved session plan.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    /// Model type name.
    pub model_name: String,
    /// Model source.
    pub source: ModelSource,
    /// Declared ports. Empty for reference models that were configured
    /// without a port table.
    pub ports: Vec<PortSpec>,
    /// Trace settings, present only when tracing is enabled.
    pub trace: Option<TracePlan>,
    /// Whether destroy leaves the model allocated.
    pub leak_model_on_destroy: bool,
}

/// Returns the trace file name for a prefix and model name:
/// `<prefix>.<model>.vcd`.
pub fn trace_file_name(prefix: &str, model_name: &str) -> String {
    format!("{prefix}.{model_name}.vcd")
}

/// Resolves a validated configuration into a [`SessionPlan`].
///
/// Relative paths (library, trace directory) are resolved against
/// `base_dir`, normally the directory containing `vshim.toml`.
pub fn resolve_session_plan(
    config: &ShimConfig,
    base_dir: &Path,
) -> Result<SessionPlan, ConfigError> {
    let source = match (&config.model.library, &config.model.reference) {
        (Some(lib), None) => ModelSource::Library(base_dir.join(lib)),
        (None, Some(name)) => ModelSource::Reference {
            name: name.clone(),
            width: config.model.width,
        },
        (None, None) => {
            return Err(ConfigError::MissingField(
                "model.library or model.reference".to_string(),
            ))
        }
        (Some(_), Some(_)) => {
            return Err(ConfigError::ValidationError(
                "model.library and model.reference are mutually exclusive".to_string(),
            ))
        }
    };

    let trace = if config.trace.enabled {
        check_single_trace_writer(config)?;
        let file = trace_file_name(&config.trace.prefix, &config.model.name);
        Some(TracePlan {
            path: base_dir.join(&config.trace.dir).join(file),
            clock: (!config.trace.clock.is_empty()).then(|| config.trace.clock.clone()),
            tick: config.trace.tick,
            timescale: config.trace.timescale.clone(),
            scope: config.model.name.clone(),
        })
    } else {
        None
    };

    Ok(SessionPlan {
        model_name: config.model.name.clone(),
        source,
        ports: config.ports.clone(),
        trace,
        leak_model_on_destroy: config.session.leak_model_on_destroy,
    })
}
