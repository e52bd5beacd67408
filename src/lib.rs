//! # Local API Shim
//!
//! A local persistence shim that serves a small REST contract (`/api/...`)
//! from on-device data, so client code written against a backend keeps
//! working with no server at all. Records are kept in LMDB through a
//! string-keyed store, one JSON array per collection.
//!
//! ## Layers
//!
//! - [`kv_backend`] - string key/value persistence ([`LmdbBackend`](kv_backend::LmdbBackend),
//!   [`MemoryBackend`](kv_backend::MemoryBackend))
//! - [`record_store`] - CRUD and the dashboard summary over named collections
//! - [`interceptor`] - route table mapping `(method, url)` onto the store,
//!   forwarding everything else to a real transport
//! - FFI functions below - C-compatible boundary for hosts such as a WebView shell
//!
//! ## Quick Start
//!
//! ```rust
//! use local_api_shim::interceptor::{Request, RequestInterceptor};
//! use local_api_shim::kv_backend::MemoryBackend;
//! use local_api_shim::record_store::RecordStore;
//! use local_api_shim::shim_config::ShimConfig;
//!
//! let store = RecordStore::open(MemoryBackend::new(), &ShimConfig::default())?;
//! let api = RequestInterceptor::new(&store, |req: &Request| req.url.clone());
//!
//! let created = api.handle(
//!     &Request::new("/api/workers").with_method("POST").with_body(r#"{"name":"Ahmed"}"#),
//! )?;
//! assert!(created.handled().is_some());
//!
//! let forwarded = api.handle(&Request::new("/api/unknown"))?;
//! assert!(forwarded.is_pass_through());
//! # Ok::<(), local_api_shim::AppResponse>(())
//! ```
//!
//! ## FFI Functions
//!
//! - [`create_store`] / [`create_store_with_config`] - open a store
//! - [`handle_request`] - serve one simulated HTTP call
//! - [`dashboard_summary`] - aggregate over sales and expenses
//! - [`clear_all_records`] - wipe every collection
//! - [`export_data`] / [`import_data`] - JSON snapshot of every collection
//! - [`attendance_by_date`] / [`mark_attendance`] - attendance helpers
//! - [`close_store`] - release the handle
//! - [`free_string`] - release a string returned by any of the above

pub mod app_response;
pub mod interceptor;
pub mod kv_backend;
pub mod local_db_model;
pub mod local_db_state;
pub mod record_store;
pub mod seed;
pub mod shim_config;

pub use crate::app_response::{AppResponse, Result};

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::{info, warn};

use crate::interceptor::Request;
use crate::local_db_state::ShimState;
use crate::shim_config::ShimConfig;

/// Opens (or creates) a store at `<name>.lmdb` with the default configuration.
///
/// Empty `storage`, `sales` and `expenses` collections are seeded with sample
/// rows on first open.
///
/// # Returns
///
/// A pointer to the [`ShimState`] on success, or null on failure. Release it
/// with [`close_store`].
///
/// # Safety
///
/// `name` must be null or a valid null-terminated string.
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use local_api_shim::{create_store, close_store};
///
/// let name = CString::new("alwasiloon").unwrap();
/// let state = create_store(name.as_ptr());
/// assert!(!state.is_null());
/// close_store(state);
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store(name: *const c_char) -> *mut ShimState {
    open_store(name, ShimConfig::default())
}

/// Same as [`create_store`] but reads a [`ShimConfig`] from `config_json`.
///
/// A null `config_json` means the default configuration. Malformed JSON
/// returns null.
///
/// ```no_run
/// use std::ffi::CString;
/// use local_api_shim::create_store_with_config;
///
/// let name = CString::new("alwasiloon").unwrap();
/// let config = CString::new(r#"{"seed_on_init":false,"map_size":1048576}"#).unwrap();
/// let state = create_store_with_config(name.as_ptr(), config.as_ptr());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_store_with_config(
    name: *const c_char,
    config_json: *const c_char,
) -> *mut ShimState {
    if config_json.is_null() {
        return open_store(name, ShimConfig::default());
    }

    let config = match unsafe { CStr::from_ptr(config_json).to_str() }
        .map_err(|e| AppResponse::BadRequest(format!("Invalid UTF-8 in config: {e}")))
        .and_then(ShimConfig::from_json)
    {
        Ok(config) => config,
        Err(e) => {
            warn!("Rejected store configuration: {e}");
            return std::ptr::null_mut();
        }
    };

    open_store(name, config)
}

fn open_store(name: *const c_char, config: ShimConfig) -> *mut ShimState {
    if name.is_null() {
        warn!("Null name pointer passed to create_store");
        return std::ptr::null_mut();
    }

    let name_str = match unsafe { CStr::from_ptr(name).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in name parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    match ShimState::init(name_str, &config) {
        Ok(state) => {
            info!("Store '{name_str}' ready");
            Box::into_raw(Box::new(state))
        }
        Err(e) => {
            warn!("Failed to open store '{name_str}': {e}");
            std::ptr::null_mut()
        }
    }
}

/// Serves one simulated HTTP call against the store.
///
/// # Parameters
///
/// * `state` - handle from [`create_store`]
/// * `url` - request path, e.g. `/api/sales/3`
/// * `method` - HTTP verb; null means `GET`
/// * `body` - JSON request body, may be null
///
/// # Returns
///
/// A JSON envelope. For a matched route:
///
/// ```json
/// {"Ok": "{\"ok\":true,\"status\":200,\"body\":[...]}"}
/// ```
///
/// For an unmatched route the inner document is `{"passThrough":true}` and the
/// host should perform the real network call. Malformed bodies come back as
/// `SerializationError` or `BadRequest`.
///
/// ```no_run
/// use std::ffi::CString;
/// use local_api_shim::{create_store, handle_request, free_string};
///
/// let name = CString::new("alwasiloon").unwrap();
/// let state = create_store(name.as_ptr());
///
/// let url = CString::new("/api/dashboard").unwrap();
/// let result = handle_request(state, url.as_ptr(), std::ptr::null(), std::ptr::null());
/// free_string(result as *mut _);
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn handle_request(
    state: *mut ShimState,
    url: *const c_char,
    method: *const c_char,
    body: *const c_char,
) -> *const c_char {
    let state = match unsafe { state.as_ref() } {
        Some(s) => s,
        None => return null_state_error("handle_request"),
    };

    let url = match c_ptr_to_string(url, "url") {
        Ok(url) => url,
        Err(error_ptr) => return error_ptr,
    };

    let mut request = Request::new(url);

    if !method.is_null() {
        match c_ptr_to_string(method, "method") {
            Ok(method) => request = request.with_method(method),
            Err(error_ptr) => return error_ptr,
        }
    }

    if !body.is_null() {
        match c_ptr_to_string(body, "body") {
            Ok(body) => request = request.with_body(body),
            Err(error_ptr) => return error_ptr,
        }
    }

    match state.handle(&request) {
        Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
        Err(e) => response_to_c_string(&e),
    }
}

/// Returns the dashboard summary as `{"Ok": "{\"totalIncome\":...}"}`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn dashboard_summary(state: *mut ShimState) -> *const c_char {
    let state = match unsafe { state.as_ref() } {
        Some(s) => s,
        None => return null_state_error("dashboard_summary"),
    };

    match serde_json::to_string(&state.summary()) {
        Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Removes every collection and the id counters, then re-seeds the sample rows
/// if the store was opened with seeding enabled.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn clear_all_records(state: *mut ShimState) -> *const c_char {
    let state = match unsafe { state.as_ref() } {
        Some(s) => s,
        None => return null_state_error("clear_all_records"),
    };

    match state.clear_all_records() {
        Ok(()) => {
            response_to_c_string(&AppResponse::success("All records cleared successfully"))
        }
        Err(e) => response_to_c_string(&e),
    }
}

/// Returns a pretty-printed snapshot of every collection, wrapped as
/// `{"Ok": "<snapshot>"}`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn export_data(state: *mut ShimState) -> *const c_char {
    let state = match unsafe { state.as_ref() } {
        Some(s) => s,
        None => return null_state_error("export_data"),
    };

    match state.export() {
        Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
        Err(e) => response_to_c_string(&e),
    }
}

/// Restores a snapshot produced by [`export_data`].
///
/// Collections missing from the snapshot are left untouched. A snapshot with
/// a non-array collection entry is rejected as `BadRequest` before anything
/// is written.
///
/// ```no_run
/// use std::ffi::CString;
/// use local_api_shim::{create_store, import_data, free_string};
///
/// let name = CString::new("alwasiloon").unwrap();
/// let state = create_store(name.as_ptr());
///
/// let snapshot = CString::new(r#"{"workers":[{"id":1,"name":"Ahmed"}]}"#).unwrap();
/// let result = import_data(state, snapshot.as_ptr());
/// free_string(result as *mut _);
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn import_data(state: *mut ShimState, snapshot: *const c_char) -> *const c_char {
    let state = match unsafe { state.as_ref() } {
        Some(s) => s,
        None => return null_state_error("import_data"),
    };

    let snapshot = match c_ptr_to_string(snapshot, "snapshot") {
        Ok(snapshot) => snapshot,
        Err(error_ptr) => return error_ptr,
    };

    match state.import(&snapshot) {
        Ok(count) => {
            response_to_c_string(&AppResponse::success(format!("Imported {count} collection(s)")))
        }
        Err(e) => response_to_c_string(&e),
    }
}

/// Attendance rows for one `date` (as stored, e.g. `2024-01-01`), returned
/// as `{"Ok": "[...]"}`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn attendance_by_date(state: *mut ShimState, date: *const c_char) -> *const c_char {
    let state = match unsafe { state.as_ref() } {
        Some(s) => s,
        None => return null_state_error("attendance_by_date"),
    };

    let date = match c_ptr_to_string(date, "date") {
        Ok(date) => date,
        Err(error_ptr) => return error_ptr,
    };

    match state.attendance_by_date(&date) {
        Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
        Err(e) => response_to_c_string(&e),
    }
}

/// Records attendance for one worker on one date, replacing any earlier mark
/// for the same pair.
///
/// `mark_json` is `{"workerId": 2, "date": "2024-01-01", "status": "present"}`.
/// The stored row is returned as `{"Ok": "{\"id\":...}"}`.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn mark_attendance(
    state: *mut ShimState,
    mark_json: *const c_char,
) -> *const c_char {
    let state = match unsafe { state.as_ref() } {
        Some(s) => s,
        None => return null_state_error("mark_attendance"),
    };

    let mark = match c_ptr_to_string(mark_json, "mark_json") {
        Ok(mark) => mark,
        Err(error_ptr) => return error_ptr,
    };

    match state.mark_attendance(&mark) {
        Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
        Err(e) => response_to_c_string(&e),
    }
}

/// Releases a handle from [`create_store`]. The pointer must not be used
/// afterwards.
///
/// The LMDB environment is closed when the handle is dropped.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_store(state: *mut ShimState) -> *const c_char {
    if state.is_null() {
        return null_state_error("close_store");
    }

    drop(unsafe { Box::from_raw(state) });
    info!("Store handle released");
    response_to_c_string(&AppResponse::success("Store closed successfully"))
}

/// Frees a string returned by this library. Null is ignored.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_string(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    drop(unsafe { CString::from_raw(ptr) });
}

/// Serializes `response` into a C string owned by the caller.
///
/// Returns null if serialization or C string creation fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

fn null_state_error(function: &str) -> *const c_char {
    let error = AppResponse::BadRequest(format!("Null state pointer passed to {function}"));
    response_to_c_string(&error)
}

/// Converts a C string pointer to a Rust `String`.
///
/// On failure the `Err` side already holds an encoded `BadRequest` envelope
/// ready to hand back to the caller.
fn c_ptr_to_string(
    ptr: *const c_char,
    field_name: &str,
) -> std::result::Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}
