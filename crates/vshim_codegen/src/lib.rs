//! Generation of the C wrapper around a Verilator-compiled model.
//!
//! Given a model name and its port list, this crate renders the
//! `V<model>_v.cpp` source that exposes `create_model`, `destroy_model`,
//! `eval`, and one pointer symbol per port, plus the matching `V<model>_v.h`
//! header. Building the wrapper against the simulator's output is left to
//! the caller's build system; the resulting shared library is what
//! `vshim_sim::DylibModel` loads.

#![warn(missing_docs)]

pub mod error;
pub mod spec;
pub mod wrapper;

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

pub use error::CodegenError;
pub use spec::WrapperSpec;
pub use wrapper::{header_file_name, render_header, render_wrapper, wrapper_file_name};

/// Paths of the files written by [`write_wrapper`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedFiles {
    /// The `V<model>_v.cpp` source.
    pub source: PathBuf,
    /// The `V<model>_v.h` header.
    pub header: PathBuf,
}

/// Validates `spec` and writes the wrapper source and header into `dir`,
/// creating it if needed.
pub fn write_wrapper(dir: &Path, spec: &WrapperSpec) -> Result<GeneratedFiles, CodegenError> {
    spec.validate()?;
    fs::create_dir_all(dir)?;

    let source = dir.join(wrapper_file_name(&spec.model_name));
    let header = dir.join(header_file_name(&spec.model_name));
    fs::write(&source, render_wrapper(spec))?;
    fs::write(&header, render_header(spec))?;

    info!(
        "generated wrapper for {} ({} ports) in {}",
        spec.model_name,
        spec.ports.len(),
        dir.display()
    );
    Ok(GeneratedFiles { source, header })
}
