//! Data model for the phone book.
//!
//! A [`Record`] is the only persisted entity. Its mutable part is split out as
//! [`RecordFields`], which is what callers hand to the store for create and
//! update; the store alone assigns and owns [`Record::id`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;

/// Text format used for record dates, both stored and displayed.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Price applied when the user leaves it untouched.
pub const DEFAULT_PRICE: &str = "Free";

/// A single contact or appointment entry.
///
/// # Examples
///
/// ```rust
/// use phone_book_core::record::Record;
///
/// let json = r#"{"id":7,"name":"Ann","phone":"123","description":"desk","price":"Free","date":"05/03/2024","done":false}"#;
/// let record: Record = serde_json::from_str(json)?;
/// assert_eq!(record.id, Some(7));
/// assert_eq!(record.calendar_date(), chrono::NaiveDate::from_ymd_opt(2024, 3, 5));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Store-assigned key. `None` only for records that were never saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    pub phone: String,
    pub description: String,
    pub price: String,
    /// `DD/MM/YYYY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

impl Record {
    /// Builds an unsaved record from its mutable fields.
    pub fn from_fields(fields: RecordFields) -> Self {
        Self {
            id: None,
            name: fields.name,
            phone: fields.phone,
            description: fields.description,
            price: fields.price,
            date: fields.date,
            done: Some(fields.done),
        }
    }

    /// Replaces every mutable field, keeping the id.
    pub fn apply(&mut self, fields: RecordFields) {
        self.name = fields.name;
        self.phone = fields.phone;
        self.description = fields.description;
        self.price = fields.price;
        self.date = fields.date;
        self.done = Some(fields.done);
    }

    /// The record date as a calendar day, if present and well formed.
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_date)
    }

    pub fn is_done(&self) -> bool {
        self.done.unwrap_or(false)
    }
}

/// Everything about a record except its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    pub name: String,
    pub phone: String,
    pub description: String,
    #[serde(default = "default_price")]
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub done: bool,
}

impl RecordFields {
    pub fn new(
        name: impl Into<String>,
        phone: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            phone: phone.into(),
            description: description.into(),
            price: default_price(),
            date: None,
            done: false,
        }
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(format_date(date));
        self
    }

    pub fn with_done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }

    /// Trims the text fields and rejects the set when name, phone or
    /// description ends up empty.
    pub fn validated(self) -> Result<Self, AppResponse> {
        let fields = Self {
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            description: self.description.trim().to_string(),
            price: self.price.trim().to_string(),
            date: self.date,
            done: self.done,
        };

        let missing: Vec<&str> = [
            ("name", &fields.name),
            ("phone", &fields.phone),
            ("description", &fields.description),
        ]
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(field, _)| *field)
        .collect();

        if missing.is_empty() {
            Ok(fields)
        } else {
            Err(AppResponse::ValidationError(format!(
                "Required fields are empty: {}",
                missing.join(", ")
            )))
        }
    }
}

impl From<&Record> for RecordFields {
    fn from(record: &Record) -> Self {
        Self {
            name: record.name.clone(),
            phone: record.phone.clone(),
            description: record.description.clone(),
            price: record.price.clone(),
            date: record.date.clone(),
            done: record.is_done(),
        }
    }
}

fn default_price() -> String {
    DEFAULT_PRICE.to_string()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parses `DD/MM/YYYY`. Unpadded day and month (`5/3/2024`) are accepted.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok()
}
