use lmdb::Error as LmdbError;
use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;
use thiserror::Error;

/// Outcome of every store and FFI operation.
///
/// The non-`Ok` variants double as the crate's error type, and the whole enum
/// is what FFI callers receive serialized as JSON (`{"NotFound":"..."}`).
#[derive(Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppResponse {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Malformed import: {0}")]
    MalformedImport(String),
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Ok: {0}")]
    Ok(String),
}

impl From<LmdbError> for AppResponse {
    fn from(err: LmdbError) -> Self {
        match err {
            LmdbError::NotFound => AppResponse::NotFound("Key not found".to_string()),
            LmdbError::MapFull => {
                AppResponse::DatabaseError("Storage quota exceeded (map full)".to_string())
            }
            LmdbError::Corrupted => AppResponse::DatabaseError("Database is corrupted".to_string()),
            _ => AppResponse::DatabaseError(format!("LMDB error: {err}")),
        }
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {err}"))
    }
}

impl From<std::io::Error> for AppResponse {
    fn from(err: std::io::Error) -> Self {
        AppResponse::DatabaseError(format!("IO error: {err}"))
    }
}

impl AppResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        AppResponse::Ok(msg.into())
    }

    /// True for a storage-level failure, as opposed to a rejected input.
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, AppResponse::DatabaseError(_))
    }
}
