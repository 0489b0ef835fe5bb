//! Bulk import and export of records as JSON files.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::warn;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::app_response::AppResponse;
use crate::record::Record;
use crate::record_store::MAX_RECORD_ID;

/// Entries accepted from an import file, plus how many were rejected.
#[derive(Debug, Default)]
pub struct ImportBatch {
    pub accepted: Vec<Record>,
    pub skipped: usize,
}

/// What an import did to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Parses an import file body.
///
/// The body must be a JSON array, otherwise the whole import is rejected.
/// Each element is checked on its own and skipped when it does not have the
/// record shape.
pub fn parse_import(text: &str) -> Result<ImportBatch, AppResponse> {
    let value: JsonValue = serde_json::from_str(text)
        .map_err(|e| AppResponse::MalformedImport(format!("Invalid JSON: {e}")))?;

    let JsonValue::Array(entries) = value else {
        return Err(AppResponse::MalformedImport(
            "Expected a JSON array of records".to_string(),
        ));
    };

    let mut batch = ImportBatch::default();
    for (index, entry) in entries.into_iter().enumerate() {
        match validate_entry(&entry) {
            Ok(record) => batch.accepted.push(record),
            Err(reason) => {
                warn!("Invalid record at index {index} skipped ({reason}): {entry}");
                batch.skipped += 1;
            }
        }
    }
    Ok(batch)
}

fn validate_entry(entry: &JsonValue) -> Result<Record, String> {
    let JsonValue::Object(fields) = entry else {
        return Err("not an object".to_string());
    };

    let id = match fields.get("id") {
        None => None,
        Some(value) => match value.as_u64() {
            Some(id) if id <= MAX_RECORD_ID => Some(id),
            Some(id) => return Err(format!("id {id} exceeds {MAX_RECORD_ID}")),
            None => return Err("id must be a non-negative integer".to_string()),
        },
    };

    let date = match fields.get("date") {
        None => None,
        Some(JsonValue::String(date)) => Some(date.clone()),
        Some(_) => return Err("date must be a string".to_string()),
    };

    let done = match fields.get("done") {
        None => None,
        Some(JsonValue::Bool(done)) => Some(*done),
        Some(_) => return Err("done must be a boolean".to_string()),
    };

    Ok(Record {
        id,
        name: required_string(fields, "name")?,
        phone: required_string(fields, "phone")?,
        description: required_string(fields, "description")?,
        price: required_string(fields, "price")?,
        date,
        done,
    })
}

fn required_string(fields: &Map<String, JsonValue>, key: &str) -> Result<String, String> {
    match fields.get(key) {
        Some(JsonValue::String(value)) => Ok(value.clone()),
        Some(_) => Err(format!("{key} must be a string")),
        None => Err(format!("{key} is missing")),
    }
}

/// A ready-to-save export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub contents: String,
}

impl ExportFile {
    /// Serializes `records` as-is; `day` only names the file.
    pub fn new(records: &[Record], day: NaiveDate) -> Result<Self, AppResponse> {
        Ok(Self {
            file_name: format!("names_export_{}.json", day.format("%Y-%m-%d")),
            contents: serde_json::to_string_pretty(records)?,
        })
    }

    /// Writes the file into `dir` and returns its full path.
    pub fn write_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, AppResponse> {
        let path = dir.as_ref().join(&self.file_name);
        std::fs::write(&path, &self.contents)?;
        Ok(path)
    }
}
