//! FFI bindings for the trust engine
//!
//! C-compatible functions for driving a `TrustSession` from a host app.
//! Strings cross the boundary as null-terminated UTF-8; every string returned
//! by this module must be freed with `zt_free_string`. Status-returning
//! functions return a negative value on error; call `zt_last_error` for the
//! message.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};

use crate::config::EngineConfig;
use crate::error::TrustError;
use crate::session::{LoginOutcome, TrustSession};
use crate::simulation::SimulatedAttack;
use crate::trace::EvaluationRecord;
use crate::types::{LocationFix, TypingBaseline};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Opaque handle to a TrustSession
pub struct TrustSessionHandle {
    session: TrustSession,
}

/// Run `f` against the session behind `handle`, mapping errors to `-1`
unsafe fn with_session<F>(handle: *mut TrustSessionHandle, f: F) -> i32
where
    F: FnOnce(&mut TrustSession) -> Result<i32, TrustError>,
{
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }

    match f(&mut (*handle).session) {
        Ok(status) => status,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

fn local_time(unix_ms: i64, utc_offset_minutes: i32) -> Result<DateTime<FixedOffset>, TrustError> {
    let offset = utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| {
            TrustError::InvalidInput(format!("UTC offset out of range: {utc_offset_minutes} min"))
        })?;
    let utc = Utc
        .timestamp_millis_opt(unix_ms)
        .single()
        .ok_or_else(|| TrustError::InvalidInput(format!("timestamp out of range: {unix_ms}")))?;
    Ok(utc.with_timezone(&offset))
}

// ============================================================================
// Session lifecycle
// ============================================================================

/// Create a session. `config_json` may be NULL for the default configuration.
///
/// # Safety
/// - `config_json` must be NULL or a valid null-terminated C string.
/// - Must be freed with `zt_session_free`.
/// - Returns NULL on error; call `zt_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn zt_session_new(config_json: *const c_char) -> *mut TrustSessionHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        EngineConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match EngineConfig::from_json(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match TrustSession::new(config) {
        Ok(session) => Box::into_raw(Box::new(TrustSessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a session.
///
/// # Safety
/// - `handle` must be a pointer returned by `zt_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn zt_session_free(handle: *mut TrustSessionHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Clear typing window, baseline, simulations and login state.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
#[no_mangle]
pub unsafe extern "C" fn zt_session_reset(handle: *mut TrustSessionHandle) -> i32 {
    with_session(handle, |session| {
        session.reset_session();
        Ok(0)
    })
}

/// Clear signals, simulations and login state, keeping the typing baseline.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
#[no_mangle]
pub unsafe extern "C" fn zt_session_reset_signals(handle: *mut TrustSessionHandle) -> i32 {
    with_session(handle, |session| {
        session.reset_signals();
        Ok(0)
    })
}

// ============================================================================
// Signal capture
// ============================================================================

/// Record a typed character. Returns 1 once a typing pattern is available, else 0.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
#[no_mangle]
pub unsafe extern "C" fn zt_session_record_keystroke(
    handle: *mut TrustSessionHandle,
    at_ms: u64,
) -> i32 {
    with_session(handle, |session| {
        Ok(i32::from(session.record_keystroke(at_ms)?.is_some()))
    })
}

/// Record a deletion in a monitored field.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
#[no_mangle]
pub unsafe extern "C" fn zt_session_record_deletion(handle: *mut TrustSessionHandle) -> i32 {
    with_session(handle, |session| {
        session.record_deletion();
        Ok(0)
    })
}

/// Record an accelerometer sample. Returns the resulting stability (0-100).
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
#[no_mangle]
pub unsafe extern "C" fn zt_session_record_motion(
    handle: *mut TrustSessionHandle,
    x: f64,
    y: f64,
    z: f64,
    at_ms: u64,
) -> i32 {
    with_session(handle, |session| {
        session.record_motion_sample(x, y, z, at_ms)?;
        Ok(i32::from(session.stability()))
    })
}

/// Set the current location fix.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
#[no_mangle]
pub unsafe extern "C" fn zt_session_set_location(
    handle: *mut TrustSessionHandle,
    latitude: f64,
    longitude: f64,
) -> i32 {
    with_session(handle, |session| {
        session.set_location(Some(LocationFix::new(latitude, longitude)?))?;
        Ok(0)
    })
}

/// Forget the current location fix.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
#[no_mangle]
pub unsafe extern "C" fn zt_session_clear_location(handle: *mut TrustSessionHandle) -> i32 {
    with_session(handle, |session| {
        session.set_location(None)?;
        Ok(0)
    })
}

// ============================================================================
// Login state
// ============================================================================

/// Record a failed login. Returns the consecutive failure count.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
#[no_mangle]
pub unsafe extern "C" fn zt_session_record_login_failure(handle: *mut TrustSessionHandle) -> i32 {
    with_session(handle, |session| {
        let failures = session.record_login_failure();
        Ok(i32::try_from(failures).unwrap_or(i32::MAX))
    })
}

/// Record a correct credential check.
///
/// Returns 0 when accepted (failure count cleared) or 1 when a step-up is
/// required because the failure count had reached the lockout threshold.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
#[no_mangle]
pub unsafe extern "C" fn zt_session_record_login_success(handle: *mut TrustSessionHandle) -> i32 {
    with_session(handle, |session| match session.record_login_success() {
        LoginOutcome::Accepted => Ok(0),
        LoginOutcome::StepUpRequired => Ok(1),
    })
}

/// Screen credential text for injection. Returns 1 if detected, 0 if clean.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
/// - `input` must be a valid null-terminated C string.
#[no_mangle]
pub unsafe extern "C" fn zt_session_screen_credentials(
    handle: *mut TrustSessionHandle,
    input: *const c_char,
) -> i32 {
    let Some(text) = cstr_to_string(input) else {
        set_last_error("Invalid input string pointer");
        return -1;
    };
    with_session(handle, |session| Ok(i32::from(session.screen_credentials(&text))))
}

// ============================================================================
// Baseline and simulation
// ============================================================================

/// Set the typing baseline explicitly.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
#[no_mangle]
pub unsafe extern "C" fn zt_session_set_baseline(
    handle: *mut TrustSessionHandle,
    mean_interval_ms: f64,
    variance: f64,
) -> i32 {
    with_session(handle, |session| {
        session.set_baseline(TypingBaseline::new(mean_interval_ms, variance)?);
        Ok(0)
    })
}

/// Promote the live typing pattern to the baseline. Returns 1 if set, 0 if no data.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
#[no_mangle]
pub unsafe extern "C" fn zt_session_establish_baseline(handle: *mut TrustSessionHandle) -> i32 {
    with_session(handle, |session| {
        Ok(i32::from(session.establish_baseline_from_window()))
    })
}

/// Arm a simulated attack: 0 = bot typing, 1 = impossible travel.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
#[no_mangle]
pub unsafe extern "C" fn zt_session_simulate(handle: *mut TrustSessionHandle, attack: i32) -> i32 {
    with_session(handle, |session| {
        let attack = match attack {
            0 => SimulatedAttack::BotTyping,
            1 => SimulatedAttack::ImpossibleTravel,
            other => {
                return Err(TrustError::InvalidInput(format!(
                    "unknown simulated attack: {other}"
                )))
            }
        };
        session.simulate(attack);
        Ok(0)
    })
}

/// Disarm every simulated attack.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
#[no_mangle]
pub unsafe extern "C" fn zt_session_clear_simulations(handle: *mut TrustSessionHandle) -> i32 {
    with_session(handle, |session| {
        session.clear_simulations();
        Ok(0)
    })
}

// ============================================================================
// Evaluation
// ============================================================================

/// Evaluate the session and return the evaluation record as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `zt_session_new`.
/// - Returns a newly allocated string that must be freed with `zt_free_string`.
/// - Returns NULL on error; call `zt_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn zt_session_evaluate(
    handle: *mut TrustSessionHandle,
    unix_ms: i64,
    utc_offset_minutes: i32,
) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }

    let session = &mut (*handle).session;

    let at = match local_time(unix_ms, utc_offset_minutes) {
        Ok(at) => at,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let trust = session.evaluate(at);
    let record = EvaluationRecord {
        session_id: session.id(),
        at,
        action: trust.action(),
        trust,
    };

    match serde_json::to_string(&record) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by this library.
///
/// # Safety
/// - `ptr` must be a pointer returned by a `zt_` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn zt_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next `zt_` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn zt_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn zt_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffi_session_lifecycle() {
        unsafe {
            let handle = zt_session_new(ptr::null());
            assert!(!handle.is_null());

            assert_eq!(zt_session_set_baseline(handle, 200.0, 500.0), 0);
            assert_eq!(zt_session_record_keystroke(handle, 0), 0);
            assert_eq!(zt_session_record_keystroke(handle, 200), 0);
            assert_eq!(zt_session_record_keystroke(handle, 400), 0);
            assert_eq!(zt_session_record_keystroke(handle, 600), 1);
            assert_eq!(zt_session_record_motion(handle, 9.0, 9.0, 9.0, 1_000), 95);

            // 2024-01-15T12:00:00Z
            let json = zt_session_evaluate(handle, 1_705_320_000_000, 0);
            assert!(!json.is_null());
            let record: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(json).to_str().unwrap()).unwrap();
            assert_eq!(record["action"], "allow");
            assert_eq!(record["trust"]["level"], "high");
            zt_free_string(json);

            zt_session_free(handle);
        }
    }

    #[test]
    fn test_ffi_injection_denies() {
        unsafe {
            let handle = zt_session_new(ptr::null());
            let input = CString::new("1 UNION SELECT pin").unwrap();
            assert_eq!(zt_session_screen_credentials(handle, input.as_ptr()), 1);

            let json = zt_session_evaluate(handle, 1_705_320_000_000, 60);
            let record: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(json).to_str().unwrap()).unwrap();
            assert_eq!(record["trust"]["score"], 0);
            assert_eq!(record["action"], "deny");
            zt_free_string(json);
            zt_session_free(handle);
        }
    }

    #[test]
    fn test_ffi_login_lockout_requires_step_up() {
        unsafe {
            let handle = zt_session_new(ptr::null());
            for expected in 1..=5 {
                assert_eq!(zt_session_record_login_failure(handle), expected);
            }
            assert_eq!(zt_session_record_login_success(handle), 1);
            assert_eq!(zt_session_record_login_failure(handle), 6);

            assert_eq!(zt_session_set_baseline(handle, 200.0, 500.0), 0);
            assert_eq!(zt_session_reset_signals(handle), 0);
            assert_eq!(zt_session_record_login_success(handle), 0);
            assert_eq!(zt_session_establish_baseline(handle), 0);
            assert!((*handle).session.has_baseline());

            zt_session_free(handle);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        unsafe {
            assert_eq!(zt_session_record_keystroke(ptr::null_mut(), 0), -1);
            let error = zt_last_error();
            assert!(!error.is_null());
            assert_eq!(CStr::from_ptr(error).to_str().unwrap(), "Null session pointer");

            let bad_config = CString::new(r#"{"weights":{"typing":0.9}}"#).unwrap();
            assert!(zt_session_new(bad_config.as_ptr()).is_null());
            assert!(!zt_last_error().is_null());

            let handle = zt_session_new(ptr::null());
            assert_eq!(zt_session_set_location(handle, 100.0, 0.0), -1);
            assert_eq!(zt_session_simulate(handle, 7), -1);
            assert_eq!(zt_session_simulate(handle, 1), 0);
            zt_session_free(handle);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = zt_version();
            assert!(!version.is_null());
            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
