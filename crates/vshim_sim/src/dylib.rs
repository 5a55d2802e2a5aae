//! Models loaded from a shared library built around the generated wrapper.
//!
//! The wrapper exports `create_model`, `destroy_model`, `eval`, and one
//! pointer variable per port. After `create_model` each pointer variable
//! holds the address of the port's storage inside the model instance, so
//! reads and writes go straight to model memory.
//!
//! ```text
//! vshim gen → V<model>_v.cpp → (external build) → lib<model>.so → dlopen → DylibModel
//! ```

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use libloading::{Library, Symbol};
use log::debug;
use vshim_common::{CType, PortId, PortSpec, PortValue};

use crate::error::SimError;
use crate::model::SimModel;

/// Signature of the wrapper's `create_model`, `destroy_model`, and `eval`.
type VoidFn = unsafe extern "C" fn();

/// Libraries that currently back a live model. The wrapper keeps its model
/// in process-wide globals, so a second instance from the same library would
/// alias the first.
static ACTIVE_LIBRARIES: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

/// A compiled model driven through the generated wrapper's C interface.
pub struct DylibModel {
    name: String,
    path: PathBuf,
    ports: Vec<PortSpec>,
    /// Port storage addresses, parallel to `ports`.
    pointers: Vec<*mut c_void>,
    eval_fn: VoidFn,
    destroy_fn: VoidFn,
    finalized: bool,
    /// Whether this model still holds its entry in `ACTIVE_LIBRARIES`.
    claimed: bool,
    /// Loaded library (must outlive the function pointers above).
    _library: Library,
}

impl DylibModel {
    /// Loads `path`, creates the model, and binds one pointer per port.
    ///
    /// The port list must match the one the wrapper was generated from;
    /// widths decide how each pointer is dereferenced.
    pub fn load(path: &Path, name: &str, ports: &[PortSpec]) -> Result<Self, SimError> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        claim(&key)?;

        match Self::bind(path, name, ports) {
            Ok(model) => Ok(model),
            Err(e) => {
                release(&key);
                Err(e)
            }
        }
    }

    fn bind(path: &Path, name: &str, ports: &[PortSpec]) -> Result<Self, SimError> {
        let library_err = |reason: String| SimError::Library {
            path: path.to_path_buf(),
            reason,
        };

        // SAFETY: loading runs the library's static initializers. The library
        // is expected to be a wrapper produced by `vshim gen`.
        let library = unsafe { Library::new(path) }
            .map_err(|e| library_err(format!("failed to load: {e}")))?;

        // SAFETY: the wrapper declares these as `void f(void)`.
        let (create_fn, destroy_fn, eval_fn) = unsafe {
            let create: Symbol<VoidFn> = library
                .get(b"create_model\0")
                .map_err(|e| library_err(format!("missing create_model: {e}")))?;
            let destroy: Symbol<VoidFn> = library
                .get(b"destroy_model\0")
                .map_err(|e| library_err(format!("missing destroy_model: {e}")))?;
            let eval: Symbol<VoidFn> = library
                .get(b"eval\0")
                .map_err(|e| library_err(format!("missing eval: {e}")))?;
            (*create, *destroy, *eval)
        };

        // Resolve every port symbol before creating the model so a missing
        // symbol does not leave a constructed model behind.
        let mut slots = Vec::with_capacity(ports.len());
        for port in ports {
            let mut symbol = port.name.clone().into_bytes();
            symbol.push(0);
            // SAFETY: each port symbol is a pointer variable `T * <port>;`.
            let slot: *mut *mut c_void = unsafe {
                let sym: Symbol<*mut *mut c_void> = library
                    .get(&symbol)
                    .map_err(|e| library_err(format!("missing port '{}': {e}", port.name)))?;
                *sym
            };
            if slot.is_null() {
                return Err(library_err(format!("port '{}' has a null symbol", port.name)));
            }
            slots.push(slot);
        }

        // SAFETY: no model exists yet for this library (see `claim`).
        unsafe { create_fn() };

        let mut pointers = Vec::with_capacity(ports.len());
        for (port, slot) in ports.iter().zip(slots) {
            // SAFETY: `create_model` bound every port pointer.
            let ptr = unsafe { *slot };
            if ptr.is_null() {
                // SAFETY: the model was created above.
                unsafe { destroy_fn() };
                return Err(library_err(format!(
                    "port '{}' was not bound by create_model",
                    port.name
                )));
            }
            pointers.push(ptr);
        }

        debug!(
            "loaded model {name} from {} with {} ports",
            path.display(),
            ports.len()
        );

        Ok(Self {
            name: name.to_string(),
            path: path.canonicalize().unwrap_or_else(|_| path.to_path_buf()),
            ports: ports.to_vec(),
            pointers,
            eval_fn,
            destroy_fn,
            finalized: false,
            claimed: true,
            _library: library,
        })
    }

    /// Path of the loaded library.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SimModel for DylibModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn ports(&self) -> &[PortSpec] {
        &self.ports
    }

    fn eval(&mut self) {
        if !self.finalized {
            // SAFETY: the model is live until `destroy_model`.
            unsafe { (self.eval_fn)() };
        }
    }

    fn finalize(&mut self) {
        if !self.finalized {
            self.finalized = true;
            // SAFETY: called once; port pointers are not used afterwards.
            unsafe { (self.destroy_fn)() };
        }
        // The wrapper's globals are free again once destroy_model has run,
        // even if this value is leaked afterwards.
        if self.claimed {
            self.claimed = false;
            release(&self.path);
        }
    }

    fn read_port(&self, id: PortId) -> PortValue {
        let spec = &self.ports[id.index()];
        if self.finalized {
            // Port pointers dangle once destroy_model has run.
            return PortValue::new(spec.width);
        }
        let ptr = self.pointers[id.index()];
        // SAFETY: `ptr` addresses storage of the port's C type inside the
        // live model.
        unsafe {
            match spec.ctype() {
                CType::U8 => PortValue::from_u64(*(ptr as *const u8) as u64, spec.width),
                CType::U16 => PortValue::from_u64(*(ptr as *const u16) as u64, spec.width),
                CType::U32 => PortValue::from_u64(*(ptr as *const u32) as u64, spec.width),
                CType::U64 => PortValue::from_u64(*(ptr as *const u64), spec.width),
                CType::Wide { words } => {
                    let slice = std::slice::from_raw_parts(ptr as *const u32, words as usize);
                    PortValue::from_words(slice, spec.width)
                }
            }
        }
    }

    fn write_port(&mut self, id: PortId, value: &PortValue) {
        if self.finalized {
            return;
        }
        let spec = &self.ports[id.index()];
        let ptr = self.pointers[id.index()];
        let low = value.low_u64();
        // SAFETY: see `read_port`; the session only writes input ports.
        unsafe {
            match spec.ctype() {
                CType::U8 => *(ptr as *mut u8) = low as u8,
                CType::U16 => *(ptr as *mut u16) = low as u16,
                CType::U32 => *(ptr as *mut u32) = low as u32,
                CType::U64 => *(ptr as *mut u64) = low,
                CType::Wide { words } => {
                    let slice = std::slice::from_raw_parts_mut(ptr as *mut u32, words as usize);
                    let src = value.resized(spec.width);
                    slice.copy_from_slice(src.words());
                }
            }
        }
    }
}

impl Drop for DylibModel {
    fn drop(&mut self) {
        self.finalize();
    }
}

fn claim(path: &Path) -> Result<(), SimError> {
    let mut active = ACTIVE_LIBRARIES
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if active.iter().any(|p| p == path) {
        return Err(SimError::Library {
            path: path.to_path_buf(),
            reason: "a model from this library is already live".to_string(),
        });
    }
    active.push(path.to_path_buf());
    Ok(())
}

fn release(path: &Path) {
    let mut active = ACTIVE_LIBRARIES
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    active.retain(|p| p != path);
}
