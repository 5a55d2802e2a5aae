//! Simulation sessions over compiled HDL models.
//!
//! This crate drives an externally compiled hardware model through a
//! create / step / destroy protocol with typed port access and an optional
//! VCD trace. The model itself sits behind the [`SimModel`] trait: either a
//! shared library built from the generated C wrapper ([`DylibModel`]) or one
//! of the built-in reference models.
//!
//! # Usage
//!
//! ```ignore
//! use vshim_sim::{reference::FullAdder, Session, SessionOptions};
//!
//! let mut session = Session::create(FullAdder::new(), SessionOptions::default())?;
//! session.set("in0", 1)?;
//! session.step()?;
//! assert_eq!(session.get("sum")?, 1);
//! session.destroy()?;
//! ```
//!
//! # Modules
//!
//! - `error`: Session error types
//! - `model`: The [`SimModel`] seam
//! - `ports`: Port name/id table and write checks
//! - `session`: Session lifecycle and accessors
//! - `trace`: Clock-driven trace timestamps over a recorder
//! - `waveform`: Waveform recording (VCD format)
//! - `vcd_loader`: Reading VCD files back
//! - `dylib`: Models loaded from wrapper shared libraries
//! - `reference`: Behavioral reference models

#![warn(missing_docs)]

pub mod dylib;
pub mod error;
pub mod model;
pub mod ports;
pub mod reference;
pub mod session;
pub mod trace;
pub mod vcd_loader;
pub mod waveform;

use vshim_config::{ModelSource, SessionPlan};

pub use dylib::DylibModel;
pub use error::SimError;
pub use model::SimModel;
pub use ports::PortTable;
pub use session::{Session, SessionOptions, SessionState};
pub use trace::{TraceOptions, TraceSession};
pub use vcd_loader::{load_vcd, load_vcd_file, LoadedWaveform, VcdLoadError};
pub use waveform::{VcdRecorder, WaveformRecorder};

/// A session over a model chosen at runtime.
pub type DynSession = Session<Box<dyn SimModel>>;

/// Opens a session as described by a resolved configuration plan.
///
/// Library models are bound to the plan's declared ports. Reference models
/// report their own ports; if the plan also declares ports they must match
/// exactly.
pub fn open_session(plan: &SessionPlan) -> Result<DynSession, SimError> {
    let model: Box<dyn SimModel> = match &plan.source {
        ModelSource::Library(path) => {
            Box::new(DylibModel::load(path, &plan.model_name, &plan.ports)?)
        }
        ModelSource::Reference { name, width } => {
            let model = reference::by_name(name, *width)?;
            check_declared_ports(&plan.ports, model.as_ref())?;
            model
        }
    };

    let options = SessionOptions {
        trace: plan.trace.clone().map(TraceOptions::from),
        leak_model_on_destroy: plan.leak_model_on_destroy,
    };
    Session::create(model, options)
}

fn check_declared_ports(
    declared: &[vshim_common::PortSpec],
    model: &(dyn SimModel + Send),
) -> Result<(), SimError> {
    if declared.is_empty() {
        return Ok(());
    }
    let actual = model.ports();
    if declared.len() != actual.len() {
        return Err(SimError::PortMismatch {
            reason: format!(
                "{} declares {} ports, configuration lists {}",
                model.name(),
                actual.len(),
                declared.len()
            ),
        });
    }
    for (d, a) in declared.iter().zip(actual) {
        if d != a {
            return Err(SimError::PortMismatch {
                reason: format!(
                    "configured port {} ({} {} bits) does not match model port {} ({} {} bits)",
                    d.name, d.direction, d.width, a.name, a.direction, a.width
                ),
            });
        }
    }
    Ok(())
}
