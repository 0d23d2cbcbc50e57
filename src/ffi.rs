//! FFI bindings for activity-tally
//!
//! This module provides C-compatible functions for calling the tally from
//! other languages. All functions use C strings (null-terminated) and return
//! allocated memory that must be freed by the caller using `tally_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use chrono::{DateTime, Utc};

use crate::config::{parse_utc_offset, TallyConfig, DEFAULT_UTC_OFFSET};
use crate::error::TallyError;
use crate::pipeline::quantify_json;
use crate::window::{day_window, ensure_past_or_today, WindowSelector};

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
        Err(e) => {
            set_last_error(&TallyError::EncodingError(e.to_string()).to_string());
            ptr::null_mut()
        }
    }
}

/// Reference instant: RFC 3339 text, or the current time when NULL
unsafe fn now_arg(now: *const c_char) -> Result<DateTime<Utc>, TallyError> {
    match cstr_to_string(now) {
        None => Ok(Utc::now()),
        Some(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| TallyError::InvalidTimestamp(format!("{s}: {e}"))),
    }
}

// ============================================================================
// Stateless API
// ============================================================================

/// Quantify readings JSON (array or NDJSON) and return a report JSON.
///
/// # Safety
/// - `readings_json` must be a valid null-terminated C string.
/// - `now` (RFC 3339) and `utc_offset` (`+HH:MM`) may be NULL to use the
///   current time and UTC.
/// - Returns a newly allocated string that must be freed with `tally_free_string`.
/// - Returns NULL on error; call `tally_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn tally_quantify_json(
    readings_json: *const c_char,
    window_index: i32,
    now: *const c_char,
    utc_offset: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(readings_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid readings JSON string pointer");
            return ptr::null_mut();
        }
    };

    let now = match now_arg(now) {
        Ok(now) => now,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let config = TallyConfig {
        utc_offset: cstr_to_string(utc_offset).unwrap_or_else(|| DEFAULT_UTC_OFFSET.to_string()),
        ..TallyConfig::default()
    };

    match quantify_json(&json_str, window_index, now, &config) {
        Ok(report) => string_to_cstr(&report),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Return the `[start, end)` bounds of a day window as JSON.
///
/// # Safety
/// - `now` and `utc_offset` may be NULL (current time, UTC).
/// - Returns a newly allocated string that must be freed with `tally_free_string`.
/// - Returns NULL on error; call `tally_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn tally_window_bounds_json(
    window_index: i32,
    now: *const c_char,
    utc_offset: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let result = ensure_past_or_today(window_index)
        .and_then(|()| now_arg(now))
        .and_then(|now| {
            let offset_str =
                cstr_to_string(utc_offset).unwrap_or_else(|| DEFAULT_UTC_OFFSET.to_string());
            let offset = parse_utc_offset(&offset_str)?;
            let window = day_window(window_index, now, offset)?;
            serde_json::to_string(&window).map_err(TallyError::JsonError)
        });

    match result {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Window Selector API
// ============================================================================

/// Opaque handle to a WindowSelector
pub struct TallySelectorHandle {
    selector: WindowSelector,
}

/// Create a selector positioned at today.
///
/// # Safety
/// - Returns a pointer to a newly allocated selector.
/// - Must be freed with `tally_selector_free`.
/// - A negative `lookback_limit` selects the default.
#[no_mangle]
pub unsafe extern "C" fn tally_selector_new(lookback_limit: i32) -> *mut TallySelectorHandle {
    clear_last_error();

    let selector = if lookback_limit < 0 {
        WindowSelector::default()
    } else {
        WindowSelector::new(lookback_limit)
    };
    Box::into_raw(Box::new(TallySelectorHandle { selector }))
}

/// Free a selector.
///
/// # Safety
/// - `selector` must be a valid pointer returned by `tally_selector_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn tally_selector_free(selector: *mut TallySelectorHandle) {
    if !selector.is_null() {
        drop(Box::from_raw(selector));
    }
}

/// Current day offset, or 0 for a NULL handle.
///
/// # Safety
/// - `selector` must be a valid pointer returned by `tally_selector_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn tally_selector_current(selector: *const TallySelectorHandle) -> i32 {
    match selector.as_ref() {
        Some(handle) => handle.selector.current(),
        None => 0,
    }
}

/// Step one day back. Returns 1 if the index changed, 0 if not, -1 on a NULL handle.
///
/// # Safety
/// - `selector` must be a valid pointer returned by `tally_selector_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn tally_selector_previous(selector: *mut TallySelectorHandle) -> i32 {
    step(selector, WindowSelector::previous)
}

/// Step one day forward. Returns 1 if the index changed, 0 if not, -1 on a NULL handle.
///
/// # Safety
/// - `selector` must be a valid pointer returned by `tally_selector_new`, or NULL.
#[no_mangle]
pub unsafe extern "C" fn tally_selector_next(selector: *mut TallySelectorHandle) -> i32 {
    step(selector, WindowSelector::next)
}

unsafe fn step(
    selector: *mut TallySelectorHandle,
    transition: fn(&mut WindowSelector) -> Option<i32>,
) -> i32 {
    clear_last_error();

    match selector.as_mut() {
        Some(handle) => i32::from(transition(&mut handle.selector).is_some()),
        None => {
            set_last_error("Null selector handle");
            -1
        }
    }
}

/// Free a string returned by tally functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a tally function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn tally_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next tally function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn tally_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn tally_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_readings() -> CString {
        CString::new(
            r#"[
                {"timestamp": "2024-01-15T08:00:00Z", "category": "walking"},
                {"timestamp": "2024-01-15T08:30:00Z", "category": "idle"},
                {"timestamp": "2024-01-15T09:00:00Z", "category": "walking"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_ffi_quantify_json() {
        let json = sample_readings();
        let now = CString::new("2024-01-15T10:00:00Z").unwrap();

        unsafe {
            let result = tally_quantify_json(json.as_ptr(), 0, now.as_ptr(), ptr::null());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let payload: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(payload["results"][4]["duration_sec"], 5400);
            assert_eq!(payload["totals"]["tracked_sec"], 7200);

            tally_free_string(result);
        }
    }

    #[test]
    fn test_ffi_window_bounds() {
        let now = CString::new("2024-01-15T10:00:00Z").unwrap();
        let offset = CString::new("+02:00").unwrap();

        unsafe {
            let result = tally_window_bounds_json(-1, now.as_ptr(), offset.as_ptr());
            assert!(!result.is_null());

            let window: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(window["index"], -1);
            assert_eq!(window["start"], "2024-01-13T22:00:00Z");
            assert_eq!(window["end"], "2024-01-14T22:00:00Z");

            tally_free_string(result);
        }
    }

    #[test]
    fn test_ffi_window_bounds_rejects_future_day() {
        let now = CString::new("2024-01-15T10:00:00Z").unwrap();

        unsafe {
            let result = tally_window_bounds_json(1, now.as_ptr(), ptr::null());
            assert!(result.is_null());

            let error_str = CStr::from_ptr(tally_last_error()).to_str().unwrap();
            assert!(error_str.contains("window index must be <= 0"));
        }
    }

    #[test]
    fn test_ffi_selector_lifecycle() {
        unsafe {
            let selector = tally_selector_new(1);
            assert!(!selector.is_null());

            assert_eq!(tally_selector_next(selector), 0);
            assert_eq!(tally_selector_previous(selector), 1);
            assert_eq!(tally_selector_previous(selector), 1);
            assert_eq!(tally_selector_previous(selector), 0);
            assert_eq!(tally_selector_current(selector), -2);

            tally_selector_free(selector);

            assert_eq!(tally_selector_previous(ptr::null_mut()), -1);
            assert_eq!(tally_selector_current(ptr::null()), 0);
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let invalid = CString::new("[not json").unwrap();
        let bad_now = CString::new("yesterday").unwrap();

        unsafe {
            let result = tally_quantify_json(invalid.as_ptr(), 0, ptr::null(), ptr::null());
            assert!(result.is_null());

            let error = tally_last_error();
            assert!(!error.is_null());
            assert!(!CStr::from_ptr(error).to_str().unwrap().is_empty());

            let json = sample_readings();
            let result = tally_quantify_json(json.as_ptr(), 0, bad_now.as_ptr(), ptr::null());
            assert!(result.is_null());
            let error_str = CStr::from_ptr(tally_last_error()).to_str().unwrap();
            assert!(error_str.contains("Invalid timestamp"));
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = tally_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
