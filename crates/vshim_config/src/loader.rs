//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ShimConfig;
use std::collections::HashSet;
use std::path::Path;
use vshim_common::is_c_identifier;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "vshim.toml";

/// Loads and validates `vshim.toml` from a directory.
pub fn load_config(dir: &Path) -> Result<ShimConfig, ConfigError> {
    load_config_file(&dir.join(CONFIG_FILE_NAME))
}

/// Loads and validates a configuration from an explicit file path.
pub fn load_config_file(path: &Path) -> Result<ShimConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ShimConfig, ConfigError> {
    let config: ShimConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and values are consistent.
fn validate_config(config: &ShimConfig) -> Result<(), ConfigError> {
    let model = &config.model;
    if model.name.is_empty() {
        return Err(ConfigError::MissingField("model.name".to_string()));
    }
    if !is_c_identifier(&model.name) {
        return Err(ConfigError::ValidationError(format!(
            "model name '{}' is not a C identifier",
            model.name
        )));
    }
    match (&model.library, &model.reference) {
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
        (Some(_), None) if config.ports.is_empty() => {
            return Err(ConfigError::MissingField("ports".to_string()));
        }
        _ => {}
    }
    if model.width == 0 {
        return Err(ConfigError::ValidationError(
            "model.width must be at least 1".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for port in &config.ports {
        if !is_c_identifier(&port.name) {
            return Err(ConfigError::ValidationError(format!(
                "port name '{}' is not a C identifier",
                port.name
            )));
        }
        if port.width == 0 {
            return Err(ConfigError::ValidationError(format!(
                "port '{}' has zero width",
                port.name
            )));
        }
        if !seen.insert(port.name.as_str()) {
            return Err(ConfigError::DuplicatePort(port.name.clone()));
        }
    }

    let trace = &config.trace;
    if trace.tick == 0 {
        return Err(ConfigError::ValidationError(
            "trace.tick must be positive".to_string(),
        ));
    }
    if trace.enabled && trace.prefix.is_empty() {
        return Err(ConfigError::MissingField("trace.prefix".to_string()));
    }
    check_single_trace_writer(config)?;
    let clock_used = trace.enabled || config.codegen.dump_vcd;
    if clock_used && !trace.clock.is_empty() && !config.ports.is_empty() {
        match config.ports.iter().find(|p| p.name == trace.clock) {
            None => {
                return Err(ConfigError::ValidationError(format!(
                    "trace clock '{}' is not a declared port",
                    trace.clock
                )));
            }
            Some(p) if p.width != 1 => {
                return Err(ConfigError::ValidationError(format!(
                    "trace clock '{}' must be 1 bit wide, found {}",
                    trace.clock, p.width
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Rejects a library model traced both by the session and by the wrapper's
/// own `VerilatedVcdC`; both name their file `<prefix>.<model>.vcd`.
pub(crate) fn check_single_trace_writer(config: &ShimConfig) -> Result<(), ConfigError> {
    if config.trace.enabled && config.codegen.dump_vcd && config.model.library.is_some() {
        return Err(ConfigError::ValidationError(
            "trace.enabled and codegen.dump_vcd both trace the library model; enable only one"
                .to_string(),
        ));
    }
    Ok(())
}
