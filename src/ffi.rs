//! FFI bindings for Synheart Steps
//!
//! This module provides C-compatible functions for driving the step engine from
//! mobile hosts. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `steps_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

use crate::encoder::StepReportEncoder;
use crate::engine::StepEngine;
use crate::error::StepError;
use crate::sensor::HostSensor;
use crate::store::FileStore;
use crate::types::{AccelSample, AppLifecycle};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn lifecycle_from_code(code: i32) -> Option<AppLifecycle> {
    match code {
        0 => Some(AppLifecycle::Active),
        1 => Some(AppLifecycle::Inactive),
        2 => Some(AppLifecycle::Background),
        _ => None,
    }
}

// ============================================================================
// Engine API
// ============================================================================

/// Opaque handle to a StepEngine
pub struct StepsEngineHandle {
    engine: StepEngine,
    encoder: StepReportEncoder,
}

/// Create an engine that persists to `store_dir` and runs on the device clock.
///
/// # Safety
/// - `store_dir` must be a valid null-terminated C string.
/// - Returns a pointer that must be freed with `steps_engine_free`.
/// - Returns NULL on error; call `steps_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn steps_engine_new(
    store_dir: *const c_char,
    sensor_available: bool,
) -> *mut StepsEngineHandle {
    clear_last_error();

    let dir = match cstr_to_string(store_dir) {
        Some(s) => s,
        None => {
            set_last_error("Invalid store_dir string pointer");
            return ptr::null_mut();
        }
    };

    let store = match FileStore::open(&dir) {
        Ok(store) => store,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match StepEngine::with_defaults(
        Box::new(HostSensor::new(sensor_available)),
        Arc::new(store),
    ) {
        Ok(engine) => Box::into_raw(Box::new(StepsEngineHandle {
            engine,
            encoder: StepReportEncoder::new(),
        })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free an engine. Performs a final flush if the engine is still running.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `steps_engine_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn steps_engine_free(engine: *mut StepsEngineHandle) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

/// Start tracking.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `steps_engine_new`.
/// - Returns 1 when tracking, 0 when the sensor is unavailable, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn steps_engine_start(engine: *mut StepsEngineHandle) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;
    i32::from(handle.engine.start().is_tracking)
}

/// Forward one accelerometer reading.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `steps_engine_new`.
/// - Returns 1 when the reading completed a step, 0 when it did not, -1 on
///   error (null engine or non-finite reading).
#[no_mangle]
pub unsafe extern "C" fn steps_engine_push_sample(
    engine: *mut StepsEngineHandle,
    x: f64,
    y: f64,
    z: f64,
) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;
    let sample = AccelSample::new(x, y, z);
    let finite = sample.is_finite();
    let stepped = handle.engine.on_sample(sample).is_some();

    if !finite {
        let err = StepError::InvalidSample(format!("non-finite reading ({x}, {y}, {z})"));
        set_last_error(&err.to_string());
        return -1;
    }
    i32::from(stepped)
}

/// Notify the engine of a host lifecycle change
/// (0 = active, 1 = inactive, 2 = background).
///
/// # Safety
/// - `engine` must be a valid pointer returned by `steps_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn steps_engine_lifecycle(engine: *mut StepsEngineHandle, state: i32) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let Some(lifecycle) = lifecycle_from_code(state) else {
        set_last_error(&format!("Unknown lifecycle state {state}"));
        return -1;
    };

    let handle = &mut *engine;
    handle.engine.on_lifecycle_change(lifecycle);
    0
}

/// Current state and derived projections as a JSON report.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `steps_engine_new`.
/// - Returns a newly allocated string that must be freed with `steps_free_string`.
/// - Returns NULL on error; call `steps_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn steps_engine_report_json(engine: *mut StepsEngineHandle) -> *mut c_char {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return ptr::null_mut();
    }

    let handle = &*engine;
    match handle.encoder.encode_to_json(&handle.engine.refresh()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Stop tracking and write the final record.
///
/// # Safety
/// - `engine` must be a valid pointer returned by `steps_engine_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn steps_engine_stop(engine: *mut StepsEngineHandle) -> i32 {
    clear_last_error();

    if engine.is_null() {
        set_last_error("Null engine pointer");
        return -1;
    }

    let handle = &mut *engine;
    handle.engine.stop();
    0
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Steps functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Steps function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn steps_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Steps function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn steps_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the Steps library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn steps_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
