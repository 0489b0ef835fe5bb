//! Turns user actions into store operations and derives what the list shows.
//!
//! The controller never keeps its own copy of the truth: after every mutation
//! it re-reads the whole collection from the [`RecordStore`]. Store failures
//! are logged and the action simply reports that it had no effect.

use std::path::Path;

use chrono::{Local, NaiveDate, Utc};
use log::{debug, info, warn};

use crate::app_response::AppResponse;
use crate::config::PhoneBookConfig;
use crate::record::{format_date, Record, RecordFields};
use crate::record_filter::{Pagination, RecordFilter, ScrollMetrics};
use crate::record_store::RecordStore;
use crate::transfer::{parse_import, ExportFile, ImportReport};

/// Contents of the add/edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFields {
    pub name: String,
    pub phone: String,
    pub description: String,
    pub price: String,
    pub date: Option<NaiveDate>,
    pub done: bool,
}

impl FormFields {
    pub fn blank(default_price: &str, today: NaiveDate) -> Self {
        Self {
            name: String::new(),
            phone: String::new(),
            description: String::new(),
            price: default_price.to_string(),
            date: Some(today),
            done: false,
        }
    }

    fn from_record(record: &Record, default_price: &str) -> Self {
        let price = if record.price.is_empty() {
            default_price.to_string()
        } else {
            record.price.clone()
        };
        Self {
            name: record.name.clone(),
            phone: record.phone.clone(),
            description: record.description.clone(),
            price,
            date: record.calendar_date(),
            done: record.is_done(),
        }
    }

    fn to_record_fields(&self) -> RecordFields {
        RecordFields {
            name: self.name.clone(),
            phone: self.phone.clone(),
            description: self.description.clone(),
            price: self.price.clone(),
            date: self.date.map(format_date),
            done: self.done,
        }
    }
}

/// Which record, if any, the form is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    Create { fields: FormFields },
    Edit { target_id: u64, fields: FormFields },
}

impl FormState {
    pub fn fields(&self) -> &FormFields {
        match self {
            FormState::Create { fields } | FormState::Edit { fields, .. } => fields,
        }
    }

    pub fn fields_mut(&mut self) -> &mut FormFields {
        match self {
            FormState::Create { fields } | FormState::Edit { fields, .. } => fields,
        }
    }

    pub fn edit_target(&self) -> Option<u64> {
        match self {
            FormState::Create { .. } => None,
            FormState::Edit { target_id, .. } => Some(*target_id),
        }
    }
}

pub struct ViewController {
    store: RecordStore,
    records: Vec<Record>,
    form: FormState,
    filter: RecordFilter,
    pagination: Pagination,
    default_price: String,
}

impl ViewController {
    /// Wraps `store` and performs the initial load.
    pub fn new(store: RecordStore, config: &PhoneBookConfig) -> Self {
        let mut controller = Self {
            store,
            records: Vec::new(),
            form: FormState::Create {
                fields: FormFields::blank(&config.default_price, today()),
            },
            filter: RecordFilter::new(),
            pagination: Pagination::from_config(config),
            default_price: config.default_price.clone(),
        };
        controller.reload();
        controller
    }

    /// Opens the store named in `config` and wraps it.
    pub fn open(config: &PhoneBookConfig) -> Result<Self, AppResponse> {
        let store = RecordStore::open(config)?;
        Ok(Self::new(store, config))
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// The last full read of the store.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn form_fields_mut(&mut self) -> &mut FormFields {
        self.form.fields_mut()
    }

    pub fn edit_target(&self) -> Option<u64> {
        self.form.edit_target()
    }

    pub fn edit_panel_visible(&self) -> bool {
        matches!(self.form, FormState::Edit { .. })
    }

    pub fn filter(&self) -> &RecordFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut RecordFilter {
        &mut self.filter
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    /// Re-reads the collection. On failure the previous cache is kept.
    pub fn reload(&mut self) {
        match self.store.read_all() {
            Ok(records) => {
                debug!("Loaded {} records", records.len());
                self.records = records;
            }
            Err(e) => warn!("Failed to read records: {e}"),
        }
    }

    /// Persists the form as a new record. Only valid in create mode.
    pub fn add(&mut self) -> bool {
        let FormState::Create { fields } = &self.form else {
            debug!("Add ignored while editing");
            return false;
        };
        let Ok(record_fields) = fields.to_record_fields().validated() else {
            debug!("Add ignored, required fields are empty");
            return false;
        };

        match self.store.create(record_fields) {
            Ok(record) => {
                info!("Added record {:?}", record.id);
                self.reload();
                self.reset_form();
                true
            }
            Err(e) => {
                log_failure("add", &e);
                false
            }
        }
    }

    /// Binds the form to record `id`. Replaces any current edit target.
    pub fn select(&mut self, id: u64) -> bool {
        let Some(record) = self.records.iter().find(|r| r.id == Some(id)) else {
            warn!("Cannot edit unknown record {id}");
            return false;
        };
        self.form = FormState::Edit {
            target_id: id,
            fields: FormFields::from_record(record, &self.default_price),
        };
        true
    }

    pub fn cancel_edit(&mut self) {
        self.reset_form();
    }

    /// Writes the form back to the edit target.
    pub fn save(&mut self) -> bool {
        let FormState::Edit { target_id, fields } = &self.form else {
            debug!("Save ignored, nothing is being edited");
            return false;
        };
        let target_id = *target_id;
        let Ok(record_fields) = fields.to_record_fields().validated() else {
            debug!("Save ignored, required fields are empty");
            return false;
        };

        match self.store.update(target_id, record_fields) {
            Ok(updated) => {
                if updated.is_none() {
                    warn!("Record {target_id} vanished before it could be saved");
                }
                self.reload();
                self.reset_form();
                updated.is_some()
            }
            Err(e) => {
                log_failure("save", &e);
                false
            }
        }
    }

    /// Deletes the edit target and leaves edit mode.
    pub fn delete_in_edit(&mut self) -> bool {
        let Some(target_id) = self.form.edit_target() else {
            return false;
        };
        match self.store.delete(target_id) {
            Ok(_) => {
                self.reload();
                self.reset_form();
                true
            }
            Err(e) => {
                log_failure("delete", &e);
                false
            }
        }
    }

    /// Deletes a record straight from the list. The form is left alone.
    pub fn delete(&mut self, id: u64) -> bool {
        match self.store.delete(id) {
            Ok(removed) => {
                self.reload();
                removed
            }
            Err(e) => {
                log_failure("delete", &e);
                false
            }
        }
    }

    pub fn filtered(&self) -> Vec<&Record> {
        self.filter.apply(&self.records)
    }

    /// The prefix of the filtered records that is currently rendered.
    pub fn visible(&self) -> Vec<&Record> {
        let filtered = self.filtered();
        self.pagination.window(&filtered).to_vec()
    }

    pub fn on_scroll(&mut self, metrics: ScrollMetrics) -> bool {
        let filtered_len = self.filtered().len();
        self.pagination.on_scroll(metrics, filtered_len)
    }

    /// Imports records from a JSON body. Invalid entries are skipped; a body
    /// that is not a JSON array aborts the whole import.
    pub fn import_json(&mut self, text: &str) -> Option<ImportReport> {
        let batch = match parse_import(text) {
            Ok(batch) => batch,
            Err(e) => {
                log_failure("import", &e);
                return None;
            }
        };

        match self.store.upsert_many(batch.accepted) {
            Ok(stored) => {
                self.reload();
                let report = ImportReport {
                    imported: stored.len(),
                    skipped: batch.skipped,
                };
                info!("Import finished: {report:?}");
                Some(report)
            }
            Err(e) => {
                log_failure("import", &e);
                None
            }
        }
    }

    pub fn import_file(&mut self, path: impl AsRef<Path>) -> Option<ImportReport> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(text) => self.import_json(&text),
            Err(e) => {
                warn!("Failed to read import file {}: {e}", path.as_ref().display());
                None
            }
        }
    }

    /// Serializes the full collection straight from the store.
    pub fn export(&self) -> Option<ExportFile> {
        let export = self
            .store
            .read_all()
            .and_then(|records| ExportFile::new(&records, Utc::now().date_naive()));
        match export {
            Ok(file) => Some(file),
            Err(e) => {
                log_failure("export", &e);
                None
            }
        }
    }

    fn reset_form(&mut self) {
        self.form = FormState::Create {
            fields: FormFields::blank(&self.default_price, today()),
        };
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn log_failure(action: &str, err: &AppResponse) {
    if err.is_storage_fault() {
        warn!("Storage fault during {action}: {err}");
    } else {
        warn!("{action} had no effect: {err}");
    }
}
