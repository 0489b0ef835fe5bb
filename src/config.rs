//! Runtime configuration.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is
//! a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;
use crate::record::DEFAULT_PRICE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneBookConfig {
    /// Database name; the LMDB environment lives in `<database_name>.lmdb`.
    pub database_name: String,
    /// Upper bound of the memory map, which is also the storage quota.
    pub map_size_mb: usize,
    /// Records shown before the user scrolls.
    pub page_size: usize,
    /// Records revealed per scroll trigger.
    pub page_increment: usize,
    /// Fraction of the page that must be scrolled past to reveal more.
    pub scroll_threshold: f64,
    pub default_price: String,
}

impl Default for PhoneBookConfig {
    fn default() -> Self {
        Self {
            database_name: "name-storage".to_string(),
            map_size_mb: 64,
            page_size: 2,
            page_increment: 2,
            scroll_threshold: 0.8,
            default_price: DEFAULT_PRICE.to_string(),
        }
    }
}

impl PhoneBookConfig {
    pub fn with_database_name(name: impl Into<String>) -> Self {
        Self {
            database_name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, AppResponse> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AppResponse> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Map size in bytes. Rejects sizes that do not fit in `usize`.
    pub fn map_size_bytes(&self) -> Result<usize, AppResponse> {
        self.map_size_mb
            .max(1)
            .checked_mul(1024 * 1024)
            .ok_or_else(|| {
                AppResponse::ValidationError(format!(
                    "map_size_mb {} is too large",
                    self.map_size_mb
                ))
            })
    }

    /// Directory holding the LMDB environment.
    pub fn lmdb_dir(&self) -> String {
        format!("{}.lmdb", self.database_name)
    }
}
