//! Repository error taxonomy and per-item bulk error payloads.
//!
//! # Responsibility
//! - Define the semantic error kinds surfaced by every repository operation.
//! - Render errors into the structured payload embedded in bulk results.
//! - Decorate raw store failures into the taxonomy given `(type, id)` context.
//!
//! # Invariants
//! - Every "not found" reason (absent, wrong namespace, missing index) renders
//!   the same `NotFound` message so tenant boundaries do not leak.
//! - Transport failures stay `Store` and are never recovered here.

use crate::migration::MigrationError;
use crate::model::raw_doc::RawDocError;
use crate::model::version::InvalidVersionError;
use crate::store::{
    BulkItemFailure, StoreError, DOCUMENT_MISSING_EXCEPTION, VERSION_CONFLICT_EXCEPTION,
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Semantic error for saved object repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Malformed input: wildcard namespace, wrong option combination, ...
    BadRequest(String),
    /// Type is not in the repository allow-list.
    UnsupportedType(String),
    /// Object absent, absent from the caller's namespace, or index missing.
    NotFound { type_name: String, id: String },
    /// Version mismatch, or a multi-namespace object that cannot be overwritten.
    Conflict {
        type_name: String,
        id: String,
        not_overwritable: bool,
    },
    InvalidVersion(InvalidVersionError),
    InvalidConfig(String),
    Migration(MigrationError),
    /// Store-level failure that has no semantic mapping (transport-fatal).
    Store(StoreError),
    /// Store answered with a shape the repository cannot interpret.
    Unexpected(String),
}

impl RepoError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest(reason.into())
    }

    pub fn not_found(type_name: &str, id: &str) -> Self {
        Self::NotFound {
            type_name: type_name.to_string(),
            id: id.to_string(),
        }
    }

    pub fn conflict(type_name: &str, id: &str) -> Self {
        Self::Conflict {
            type_name: type_name.to_string(),
            id: id.to_string(),
            not_overwritable: false,
        }
    }

    pub fn not_overwritable(type_name: &str, id: &str) -> Self {
        Self::Conflict {
            type_name: type_name.to_string(),
            id: id.to_string(),
            not_overwritable: true,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::BadRequest(_) | Self::UnsupportedType(_) | Self::InvalidVersion(_)
        )
    }

    /// HTTP-style status code of this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_)
            | Self::UnsupportedType(_)
            | Self::InvalidVersion(_)
            | Self::Migration(_) => 400,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::Store(err) => err.status_code().unwrap_or(503),
            Self::InvalidConfig(_) | Self::Unexpected(_) => 500,
        }
    }

    /// Renders this error as a bulk item payload.
    pub fn payload(&self) -> ErrorPayload {
        let status_code = self.status_code();
        let metadata = match self {
            Self::Conflict {
                not_overwritable: true,
                ..
            } => Some(ErrorMetadata {
                is_not_overwritable: true,
            }),
            _ => None,
        };

        ErrorPayload {
            status_code: Some(status_code),
            error: Some(status_reason(status_code).to_string()),
            message: self.to_string(),
            metadata,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(reason) => write!(f, "{reason}: Bad Request"),
            Self::UnsupportedType(type_name) => {
                write!(f, "Unsupported saved object type: '{type_name}': Bad Request")
            }
            Self::NotFound { type_name, id } => {
                write!(f, "Saved object [{type_name}/{id}] not found")
            }
            Self::Conflict { type_name, id, .. } => {
                write!(f, "Saved object [{type_name}/{id}] conflict")
            }
            Self::InvalidVersion(err) => write!(f, "{err}"),
            Self::InvalidConfig(message) => {
                write!(f, "invalid saved objects repository configuration: {message}")
            }
            Self::Migration(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Unexpected(message) => write!(f, "{message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidVersion(err) => Some(err),
            Self::Migration(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<InvalidVersionError> for RepoError {
    fn from(value: InvalidVersionError) -> Self {
        Self::InvalidVersion(value)
    }
}

impl From<MigrationError> for RepoError {
    fn from(value: MigrationError) -> Self {
        Self::Migration(value)
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<RawDocError> for RepoError {
    fn from(value: RawDocError) -> Self {
        Self::Unexpected(value.to_string())
    }
}

/// Maps a store failure on one addressed object into the taxonomy.
pub fn decorate_store_error(err: StoreError, type_name: &str, id: &str) -> RepoError {
    match err.status_code() {
        Some(409) => RepoError::conflict(type_name, id),
        Some(404) => RepoError::not_found(type_name, id),
        Some(400) => RepoError::BadRequest(err.reason().to_string()),
        _ => RepoError::Store(err),
    }
}

/// Maps a failed bulk write item into its per-item payload.
pub fn bulk_operation_error(failure: &BulkItemFailure, type_name: &str, id: &str) -> ErrorPayload {
    match failure.error_type.as_str() {
        VERSION_CONFLICT_EXCEPTION => RepoError::conflict(type_name, id).payload(),
        DOCUMENT_MISSING_EXCEPTION => RepoError::not_found(type_name, id).payload(),
        other => ErrorPayload::opaque(failure.reason.clone().unwrap_or_else(|| other.to_string())),
    }
}

/// Extra flags attached to a bulk item error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMetadata {
    pub is_not_overwritable: bool,
}

/// Structured error embedded in bulk results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ErrorMetadata>,
}

impl ErrorPayload {
    /// Payload carrying only a message, for failures with no semantic mapping.
    pub fn opaque(message: impl Into<String>) -> Self {
        Self {
            status_code: None,
            error: None,
            message: message.into(),
            metadata: None,
        }
    }

    pub fn is_not_overwritable(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|metadata| metadata.is_not_overwritable)
    }
}

/// One failed item of a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemError {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub error: ErrorPayload,
}

impl BulkItemError {
    pub fn new(id: &str, type_name: &str, error: &RepoError) -> Self {
        Self::with_payload(id, type_name, error.payload())
    }

    pub fn with_payload(id: &str, type_name: &str, error: ErrorPayload) -> Self {
        Self {
            id: id.to_string(),
            type_name: type_name.to_string(),
            error,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        self.error.status_code
    }
}

fn status_reason(status_code: u16) -> &'static str {
    match status_code {
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        429 => "Too Many Requests",
        503 => "Service Unavailable",
        _ => "Internal Server Error",
    }
}
