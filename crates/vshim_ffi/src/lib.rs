//! C ABI over vshim simulation sessions.
//!
//! Every session is an explicit heap handle owned by the caller: open one
//! with [`vshim_session_open`], drive it with [`vshim_session_eval`] and the
//! port accessors, and release it with [`vshim_session_close`]. Calls that
//! can fail return `0` on success and `-1` on failure; the failure message is
//! then available from [`vshim_last_error`] on the same thread.
//!
//! Handles are not thread-safe. Use each handle from one thread at a time.

#![warn(missing_docs)]

pub mod error;

use std::cell::RefCell;
use std::ffi::{c_char, CStr, CString};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::ptr;

use log::debug;
use vshim_common::PortId;
use vshim_config::{load_config, load_config_file, resolve_session_plan};
use vshim_sim::{open_session, DynSession};

pub use error::FfiError;

/// Opaque session handle handed to C callers.
pub struct VshimSession {
    session: DynSession,
}

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(err: &FfiError) {
    let message = CString::new(err.to_string().replace('\0', " "))
        .unwrap_or_else(|_| CString::from(c"error message unavailable"));
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

/// Runs `f`, recording any error or panic, and maps the outcome to a status
/// code.
fn status(f: impl FnOnce() -> Result<(), FfiError>) -> i32 {
    match guarded(f) {
        Some(()) => 0,
        None => -1,
    }
}

/// Runs `f` behind a panic guard, recording failures. Returns `None` on any
/// failure.
fn guarded<T>(f: impl FnOnce() -> Result<T, FfiError>) -> Option<T> {
    clear_last_error();
    let outcome = catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| {
        let msg = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown".to_string());
        Err(FfiError::Panic(msg))
    });
    match outcome {
        Ok(value) => Some(value),
        Err(e) => {
            set_last_error(&e);
            None
        }
    }
}

/// # Safety
///
/// `handle` must be null or a live pointer returned by `vshim_session_open`.
unsafe fn session_mut<'a>(handle: *mut VshimSession) -> Result<&'a mut DynSession, FfiError> {
    handle
        .as_mut()
        .map(|h| &mut h.session)
        .ok_or(FfiError::NullHandle)
}

/// # Safety
///
/// `handle` must be null or a live pointer returned by `vshim_session_open`.
unsafe fn session_ref<'a>(handle: *const VshimSession) -> Result<&'a DynSession, FfiError> {
    handle
        .as_ref()
        .map(|h| &h.session)
        .ok_or(FfiError::NullHandle)
}

unsafe fn str_arg<'a>(ptr: *const c_char, what: &'static str) -> Result<&'a str, FfiError> {
    if ptr.is_null() {
        return Err(FfiError::InvalidString(what));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| FfiError::InvalidString(what))
}

fn open_from_path(path: &Path) -> Result<DynSession, FfiError> {
    let (config, base) = if path.is_dir() {
        (load_config(path)?, path.to_path_buf())
    } else {
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        (load_config_file(path)?, base)
    };
    let plan = resolve_session_plan(&config, &base)?;
    let session = open_session(&plan)?;
    debug!("opened C session for {}", plan.model_name);
    Ok(session)
}

/// Opens a session from a `vshim.toml` file or a directory containing one.
///
/// Returns null on failure.
///
/// # Safety
///
/// `config_path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn vshim_session_open(config_path: *const c_char) -> *mut VshimSession {
    guarded(|| {
        let path = str_arg(config_path, "config_path")?;
        let session = open_from_path(Path::new(path))?;
        Ok(Box::into_raw(Box::new(VshimSession { session })))
    })
    .unwrap_or(ptr::null_mut())
}

/// Evaluates the model once and records the trace.
///
/// # Safety
///
/// `handle` must be null or a live handle from `vshim_session_open`.
#[no_mangle]
pub unsafe extern "C" fn vshim_session_eval(handle: *mut VshimSession) -> i32 {
    status(|| Ok(session_mut(handle)?.step()?))
}

/// Destroys the session and frees the handle. The handle is invalid
/// afterwards even when this returns `-1`.
///
/// # Safety
///
/// `handle` must be null or a live handle from `vshim_session_open` that is
/// not used again.
#[no_mangle]
pub unsafe extern "C" fn vshim_session_close(handle: *mut VshimSession) -> i32 {
    if handle.is_null() {
        return status(|| Err(FfiError::NullHandle));
    }
    let mut owned = Box::from_raw(handle);
    status(move || Ok(owned.session.destroy()?))
}

/// Number of ports, or `-1` on a null handle.
///
/// # Safety
///
/// `handle` must be null or a live handle from `vshim_session_open`.
#[no_mangle]
pub unsafe extern "C" fn vshim_port_count(handle: *const VshimSession) -> i32 {
    guarded(|| Ok(session_ref(handle)?.ports().len() as i32)).unwrap_or(-1)
}

/// Index of the port called `name`, or `-1` if there is none.
///
/// # Safety
///
/// `handle` must be null or a live handle; `name` must be null or a valid
/// NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn vshim_port_index(handle: *const VshimSession, name: *const c_char) -> i32 {
    guarded(|| {
        let session = session_ref(handle)?;
        let name = str_arg(name, "name")?;
        Ok(session.port_id(name)?.as_raw() as i32)
    })
    .unwrap_or(-1)
}

/// Width in bits of port `index`, or `-1` on failure.
///
/// # Safety
///
/// `handle` must be null or a live handle from `vshim_session_open`.
#[no_mangle]
pub unsafe extern "C" fn vshim_port_width(handle: *const VshimSession, index: u32) -> i32 {
    guarded(|| Ok(session_ref(handle)?.port(PortId::from_raw(index))?.width as i32)).unwrap_or(-1)
}

/// Reads the low 64 bits of port `index` into `*out`.
///
/// # Safety
///
/// `handle` must be null or a live handle; `out` must be null or valid for
/// a `u64` write.
#[no_mangle]
pub unsafe extern "C" fn vshim_port_read(
    handle: *const VshimSession,
    index: u32,
    out: *mut u64,
) -> i32 {
    status(|| {
        let session = session_ref(handle)?;
        let out = out.as_mut().ok_or(FfiError::NullOutput)?;
        *out = session.read_u64(PortId::from_raw(index))?;
        Ok(())
    })
}

/// Writes `value` to input port `index`.
///
/// # Safety
///
/// `handle` must be null or a live handle from `vshim_session_open`.
#[no_mangle]
pub unsafe extern "C" fn vshim_port_write(
    handle: *mut VshimSession,
    index: u32,
    value: u64,
) -> i32 {
    status(|| Ok(session_mut(handle)?.write_u64(PortId::from_raw(index), value)?))
}

/// Current trace timestamp; `0` when tracing is off or the handle is null.
///
/// # Safety
///
/// `handle` must be null or a live handle from `vshim_session_open`.
#[no_mangle]
pub unsafe extern "C" fn vshim_trace_time(handle: *const VshimSession) -> u64 {
    session_ref(handle)
        .ok()
        .and_then(|s| s.trace_time())
        .unwrap_or(0)
}

/// Message of the last failure on this thread, or null if the last call
/// succeeded. The pointer is valid until the next vshim call on this thread.
#[no_mangle]
pub extern "C" fn vshim_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map_or(ptr::null(), |msg| msg.as_ptr())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn last_error() -> Option<String> {
        let ptr = vshim_last_error();
        if ptr.is_null() {
            None
        } else {
            Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
        }
    }

    fn write_config(dir: &Path, body: &str) -> CString {
        std::fs::write(dir.join("vshim.toml"), body).unwrap();
        CString::new(dir.to_str().unwrap()).unwrap()
    }

    const FULL_ADDER: &str = r#"
[model]
name = "FullAdder"
reference = "full_adder"
"#;

    #[test]
    fn full_adder_through_c_abi() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), FULL_ADDER);
        unsafe {
            let h = vshim_session_open(path.as_ptr());
            assert!(!h.is_null(), "{:?}", last_error());
            assert_eq!(vshim_port_count(h), 5);

            let in0 = vshim_port_index(h, c"in0".as_ptr());
            let sum = vshim_port_index(h, c"sum".as_ptr());
            assert_eq!(in0, 0);
            assert_eq!(sum, 3);
            assert_eq!(vshim_port_width(h, sum as u32), 1);

            assert_eq!(vshim_port_write(h, in0 as u32, 1), 0);
            assert_eq!(vshim_session_eval(h), 0);
            let mut out = 0u64;
            assert_eq!(vshim_port_read(h, sum as u32, &mut out), 0);
            assert_eq!(out, 1);
            assert!(last_error().is_none());

            assert_eq!(vshim_trace_time(h), 0);
            assert_eq!(vshim_session_close(h), 0);
        }
    }

    #[test]
    fn traced_counter_through_c_abi() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"
[model]
name = "Counter"
reference = "counter"
width = 8

[trace]
enabled = true
prefix = "ffi"
"#,
        );
        unsafe {
            let h = vshim_session_open(path.as_ptr());
            assert!(!h.is_null(), "{:?}", last_error());
            let clk = vshim_port_index(h, c"clk".as_ptr()) as u32;
            for i in 0..10u64 {
                assert_eq!(vshim_port_write(h, clk, i % 2), 0);
                assert_eq!(vshim_session_eval(h), 0);
            }
            assert_eq!(vshim_trace_time(h), 45);
            assert_eq!(vshim_session_close(h), 0);
        }
        assert!(dir.path().join("ffi.Counter.vcd").exists());
    }

    #[test]
    fn errors_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), FULL_ADDER);
        unsafe {
            let h = vshim_session_open(path.as_ptr());
            assert_eq!(vshim_port_index(h, c"carry".as_ptr()), -1);
            assert_eq!(last_error().as_deref(), Some("unknown port 'carry'"));

            assert_eq!(vshim_port_write(h, 3, 1), -1);
            assert!(last_error().unwrap().contains("output"));

            assert_eq!(vshim_port_read(h, 99, ptr::null_mut()), -1);
            assert_eq!(last_error().as_deref(), Some("null output pointer"));

            let mut out = 0u64;
            assert_eq!(vshim_port_read(h, 99, &mut out), -1);
            assert!(last_error().unwrap().contains("out of range"));

            assert_eq!(vshim_port_width(h, 99), -1);
            assert_eq!(vshim_session_close(h), 0);
        }
    }

    #[test]
    fn null_handles_rejected() {
        unsafe {
            assert_eq!(vshim_session_eval(ptr::null_mut()), -1);
            assert_eq!(last_error().as_deref(), Some("null session handle"));
            assert_eq!(vshim_session_close(ptr::null_mut()), -1);
            assert_eq!(vshim_port_count(ptr::null()), -1);
            assert_eq!(vshim_port_index(ptr::null(), c"a".as_ptr()), -1);
            assert_eq!(vshim_trace_time(ptr::null()), 0);
        }
    }

    #[test]
    fn open_failures_return_null() {
        unsafe {
            assert!(vshim_session_open(ptr::null()).is_null());
            assert!(last_error().unwrap().contains("config_path"));
        }

        let dir = tempfile::tempdir().unwrap();
        let missing = CString::new(dir.path().join("nope.toml").to_str().unwrap()).unwrap();
        unsafe {
            assert!(vshim_session_open(missing.as_ptr()).is_null());
        }
        assert!(last_error().is_some());
    }

    #[test]
    fn open_from_config_file_path() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), FULL_ADDER);
        let file = CString::new(dir.path().join("vshim.toml").to_str().unwrap()).unwrap();
        unsafe {
            let h = vshim_session_open(file.as_ptr());
            assert!(!h.is_null(), "{:?}", last_error());
            assert_eq!(vshim_session_close(h), 0);
        }
    }
}
