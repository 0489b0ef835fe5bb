//! # Phone Book Core
//!
//! Local, offline contact and appointment book. Records (name, phone,
//! description, price, date, done) are persisted in an LMDB environment and
//! kept in a single collection keyed by an auto-assigned integer id.
//!
//! ## Layers
//!
//! - [`record_store::RecordStore`] - durable create / read-all / update / delete
//! - [`view_controller::ViewController`] - form state machine, filtering,
//!   progressive disclosure, import and export
//! - the `extern "C"` functions below, for UI shells that are not written in Rust
//!
//! ## Quick Start
//!
//! ```no_run
//! use phone_book_core::config::PhoneBookConfig;
//! use phone_book_core::view_controller::ViewController;
//!
//! let config = PhoneBookConfig::with_database_name("my_phone_book");
//! let mut controller = ViewController::open(&config)?;
//!
//! let form = controller.form_fields_mut();
//! form.name = "Ann".to_string();
//! form.phone = "123".to_string();
//! form.description = "desk".to_string();
//! controller.add();
//!
//! controller.filter_mut().set_search("ann");
//! assert_eq!(controller.visible().len(), 1);
//! # Ok::<(), phone_book_core::app_response::AppResponse>(())
//! ```
//!
//! ## FFI Functions
//!
//! Every function returns a JSON-encoded [`app_response::AppResponse`] as a C
//! string that must be released with [`free_response`].
//!
//! - [`create_phonebook`] - open or create a store
//! - [`create_phonebook_with_config`] - same, from a JSON [`config::PhoneBookConfig`]
//! - [`add_record`] - insert a new record
//! - [`get_record_by_id`] / [`get_all_records`] - reads
//! - [`query_records`] - filtered read
//! - [`update_record`] / [`delete_record`] - mutations
//! - [`import_records`] / [`export_records`] - bulk transfer
//! - [`close_phonebook`] - flush and release the store

pub mod app_response;
pub mod config;
pub mod record;
pub mod record_filter;
pub mod record_store;
pub mod transfer;
pub mod view_controller;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use chrono::Utc;
use log::{info, warn};

use crate::app_response::AppResponse;
use crate::config::PhoneBookConfig;
use crate::record::{Record, RecordFields};
use crate::record_filter::{FilterQuery, RecordFilter};
use crate::record_store::RecordStore;
use crate::transfer::{parse_import, ExportFile, ImportReport};

/// Opens the store named `name`, creating `<name>.lmdb` when missing.
///
/// Uses the default settings of [`PhoneBookConfig`]; see
/// [`create_phonebook_with_config`] to choose the map size (storage quota).
///
/// # Parameters
///
/// * `name` - A null-terminated C string containing the database name
///
/// # Returns
///
/// A pointer to the [`RecordStore`] on success, or a null pointer when the
/// name is null or not UTF-8, or when the environment cannot be opened.
///
/// # Safety
///
/// `name` must be null or point to a valid null-terminated string. The
/// returned pointer must be released exactly once with [`close_phonebook`].
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use phone_book_core::{close_phonebook, create_phonebook, free_response};
///
/// let name = CString::new("contacts").unwrap();
/// let store = create_phonebook(name.as_ptr());
/// assert!(!store.is_null());
/// free_response(close_phonebook(store));
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_phonebook(name: *const c_char) -> *mut RecordStore {
    if name.is_null() {
        warn!("Null name pointer passed to create_phonebook");
        return std::ptr::null_mut();
    }

    let name_str = match unsafe { CStr::from_ptr(name).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in name parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    match RecordStore::init(name_str) {
        Ok(store) => {
            info!("Phone book opened at {}", store.path());
            Box::into_raw(Box::new(store))
        }
        Err(e) => {
            warn!("Failed to open phone book '{name_str}': {e}");
            std::ptr::null_mut()
        }
    }
}

/// Opens a store described by a JSON [`PhoneBookConfig`].
///
/// Every key is optional; missing keys take their defaults:
///
/// ```json
/// {"database_name":"contacts","map_size_mb":16}
/// ```
///
/// # Parameters
///
/// * `config_ptr` - Null-terminated C string containing the configuration JSON
///
/// # Returns
///
/// A pointer to the [`RecordStore`], or a null pointer when the pointer is
/// null, the JSON is invalid, `map_size_mb` is out of range, or the
/// environment cannot be opened.
///
/// # Safety
///
/// Same contract as [`create_phonebook`].
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use phone_book_core::{close_phonebook, create_phonebook_with_config, free_response};
///
/// let config = CString::new(r#"{"database_name":"contacts","map_size_mb":16}"#).unwrap();
/// let store = create_phonebook_with_config(config.as_ptr());
/// assert!(!store.is_null());
/// free_response(close_phonebook(store));
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_phonebook_with_config(config_ptr: *const c_char) -> *mut RecordStore {
    if config_ptr.is_null() {
        warn!("Null config pointer passed to create_phonebook_with_config");
        return std::ptr::null_mut();
    }

    let config_str = match unsafe { CStr::from_ptr(config_ptr).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in config parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    let opened = PhoneBookConfig::from_json_str(config_str).and_then(|config| RecordStore::open(&config));
    match opened {
        Ok(store) => {
            info!("Phone book opened at {}", store.path());
            Box::into_raw(Box::new(store))
        }
        Err(e) => {
            warn!("Failed to open phone book from config: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Inserts a record under a freshly assigned id.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_phonebook`]
/// * `json_ptr` - Null-terminated C string with the record fields (no id)
///
/// # Returns
///
/// `Ok` with the stored record (including its new id), `ValidationError` when
/// name, phone or description is blank, `SerializationError` for bad JSON,
/// `BadRequest` for null pointers.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_phonebook`]. String
/// arguments must be null or valid null-terminated strings. The returned
/// string must be released with [`free_response`].
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use phone_book_core::{add_record, create_phonebook, free_response};
///
/// let name = CString::new("contacts").unwrap();
/// let store = create_phonebook(name.as_ptr());
///
/// let json = CString::new(
///     r#"{"name":"Ann","phone":"123","description":"desk","price":"Free","date":"05/03/2024","done":false}"#,
/// ).unwrap();
/// free_response(add_record(store, json.as_ptr()));
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn add_record(state: *mut RecordStore, json_ptr: *const c_char) -> *const c_char {
    let store = match store_ref(state, "add_record") {
        Ok(store) => store,
        Err(err) => return err,
    };

    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let fields: RecordFields = match serde_json::from_str(&json_str) {
        Ok(fields) => fields,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    respond_with_json(store.create(fields))
}

/// Retrieves one record by id.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_phonebook`]
/// * `id` - Record id
///
/// # Returns
///
/// `Ok` with the record as JSON, or `NotFound` when no record has that id.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_phonebook`]. String
/// arguments must be null or valid null-terminated strings. The returned
/// string must be released with [`free_response`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_record_by_id(state: *mut RecordStore, id: u64) -> *const c_char {
    let store = match store_ref(state, "get_record_by_id") {
        Ok(store) => store,
        Err(err) => return err,
    };

    match store.get_by_id(id) {
        Ok(Some(record)) => respond_with_json::<Record>(Ok(record)),
        Ok(None) => response_to_c_string(&AppResponse::NotFound(format!(
            "No record found with id: {id}"
        ))),
        Err(e) => response_to_c_string(&e),
    }
}

/// Retrieves every record.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_phonebook`]
///
/// # Returns
///
/// `Ok` with a JSON array of all records in ascending id order; an empty
/// store yields `[]`.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_phonebook`]. String
/// arguments must be null or valid null-terminated strings. The returned
/// string must be released with [`free_response`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_all_records(state: *mut RecordStore) -> *const c_char {
    let store = match store_ref(state, "get_all_records") {
        Ok(store) => store,
        Err(err) => return err,
    };

    respond_with_json(store.read_all())
}

/// Retrieves the records matching a filter set.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_phonebook`]
/// * `filter_ptr` - Null-terminated C string with the filter JSON; every key
///   is optional:
///
/// ```json
/// {"only_done":false,"only_not_done":true,"date":"05/03/2024","search":"pizza"}
/// ```
///
/// # Returns
///
/// `Ok` with a JSON array of the matching records, `SerializationError` when
/// the filter is not valid JSON.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_phonebook`]. String
/// arguments must be null or valid null-terminated strings. The returned
/// string must be released with [`free_response`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn query_records(
    state: *mut RecordStore,
    filter_ptr: *const c_char,
) -> *const c_char {
    let store = match store_ref(state, "query_records") {
        Ok(store) => store,
        Err(err) => return err,
    };

    let filter_str = match c_ptr_to_string(filter_ptr, "filter") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let filter: RecordFilter = match serde_json::from_str::<FilterQuery>(&filter_str) {
        Ok(query) => query.into(),
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Invalid filter JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    let result = store
        .read_all()
        .map(|records| filter.apply(&records).into_iter().cloned().collect::<Vec<_>>());
    respond_with_json(result)
}

/// Replaces every field of record `id` except the id itself.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_phonebook`]
/// * `id` - Record to update
/// * `json_ptr` - Null-terminated C string with the replacement fields
///
/// # Returns
///
/// `Ok` with the updated record, or `NotFound` (nothing written) when the
/// record does not exist.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_phonebook`]. String
/// arguments must be null or valid null-terminated strings. The returned
/// string must be released with [`free_response`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn update_record(
    state: *mut RecordStore,
    id: u64,
    json_ptr: *const c_char,
) -> *const c_char {
    let store = match store_ref(state, "update_record") {
        Ok(store) => store,
        Err(err) => return err,
    };

    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let fields: RecordFields = match serde_json::from_str(&json_str) {
        Ok(fields) => fields,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Error deserializing JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    match store.update(id, fields) {
        Ok(Some(record)) => respond_with_json::<Record>(Ok(record)),
        Ok(None) => response_to_c_string(&AppResponse::NotFound(format!(
            "No record found with id: {id}"
        ))),
        Err(e) => response_to_c_string(&e),
    }
}

/// Deletes a record by id.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_phonebook`]
/// * `id` - Record to delete
///
/// # Returns
///
/// `Ok` when the record was removed, `NotFound` when it did not exist (the
/// store is left unchanged).
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_phonebook`]. String
/// arguments must be null or valid null-terminated strings. The returned
/// string must be released with [`free_response`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn delete_record(state: *mut RecordStore, id: u64) -> *const c_char {
    let store = match store_ref(state, "delete_record") {
        Ok(store) => store,
        Err(err) => return err,
    };

    match store.delete(id) {
        Ok(true) => response_to_c_string(&AppResponse::success("Record deleted successfully")),
        Ok(false) => response_to_c_string(&AppResponse::NotFound(format!(
            "No record found with id: {id}"
        ))),
        Err(e) => response_to_c_string(&e),
    }
}

/// Imports the body of an export file.
///
/// Entries without the record shape, or with an id above
/// [`record_store::MAX_RECORD_ID`], are skipped. Entries with an id overwrite
/// the record under that id; the others get fresh ids.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_phonebook`]
/// * `json_ptr` - Null-terminated C string with a JSON array of records
///
/// # Returns
///
/// `Ok` with `{"imported":n,"skipped":m}`, or `MalformedImport` (nothing
/// written) when the body is not a JSON array.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_phonebook`]. String
/// arguments must be null or valid null-terminated strings. The returned
/// string must be released with [`free_response`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn import_records(state: *mut RecordStore, json_ptr: *const c_char) -> *const c_char {
    let store = match store_ref(state, "import_records") {
        Ok(store) => store,
        Err(err) => return err,
    };

    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(err) => return err,
    };

    let result = parse_import(&json_str).and_then(|batch| {
        let skipped = batch.skipped;
        store.upsert_many(batch.accepted).map(|stored| ImportReport {
            imported: stored.len(),
            skipped,
        })
    });
    respond_with_json(result)
}

/// Serializes the whole collection for export.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_phonebook`]
///
/// # Returns
///
/// `Ok` with the pretty-printed JSON array to write to the export file. The
/// suggested file name is logged.
///
/// # Safety
///
/// `state` must be null or a live pointer from [`create_phonebook`]. String
/// arguments must be null or valid null-terminated strings. The returned
/// string must be released with [`free_response`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn export_records(state: *mut RecordStore) -> *const c_char {
    let store = match store_ref(state, "export_records") {
        Ok(store) => store,
        Err(err) => return err,
    };

    let export = store
        .read_all()
        .and_then(|records| ExportFile::new(&records, Utc::now().date_naive()));
    match export {
        Ok(file) => {
            info!("Prepared export {}", file.file_name);
            response_to_c_string(&AppResponse::Ok(file.contents))
        }
        Err(e) => response_to_c_string(&e),
    }
}

/// Flushes and releases a store.
///
/// # Parameters
///
/// * `state` - Pointer returned by [`create_phonebook`]
///
/// # Returns
///
/// `Ok` once the environment has been synced and closed, `BadRequest` for a
/// null pointer.
///
/// # Safety
///
/// `state` is freed by this call and must not be used afterwards, nor passed
/// here twice.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_phonebook(state: *mut RecordStore) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to close_phonebook".to_string());
        return response_to_c_string(&error);
    }

    let store = unsafe { Box::from_raw(state) };
    let result = store.sync();
    drop(store);

    match result {
        Ok(()) => response_to_c_string(&AppResponse::success("Phone book closed successfully")),
        Err(e) => response_to_c_string(&e),
    }
}

/// Releases a response string returned by any function in this crate.
///
/// # Parameters
///
/// * `ptr` - String returned by this crate; null is ignored
///
/// # Safety
///
/// `ptr` must come from this crate and must not be used or freed again.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if ptr.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(ptr as *mut c_char));
    }
}

fn store_ref<'a>(state: *mut RecordStore, caller: &str) -> Result<&'a RecordStore, *const c_char> {
    match unsafe { state.as_ref() } {
        Some(store) => Ok(store),
        None => {
            let error = AppResponse::BadRequest(format!("Null state pointer passed to {caller}"));
            Err(response_to_c_string(&error))
        }
    }
}

/// Wraps a serializable result in `AppResponse::Ok`, or passes the error on.
fn respond_with_json<T: serde::Serialize>(result: Result<T, AppResponse>) -> *const c_char {
    match result {
        Ok(value) => match serde_json::to_string(&value) {
            Ok(json) => response_to_c_string(&AppResponse::Ok(json)),
            Err(e) => {
                let error = AppResponse::SerializationError(format!("Failed to serialize result: {e}"));
                response_to_c_string(&error)
            }
        },
        Err(e) => response_to_c_string(&e),
    }
}

/// Serializes `response` into a newly allocated C string. Null when that
/// fails.
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

/// Reads a C string argument, or builds the `BadRequest` response to return.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
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
