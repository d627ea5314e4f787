//! Document store client contracts.
//!
//! # Responsibility
//! - Define the async client seam the repository uses for every round-trip.
//! - Define request/response bodies for single, multi and bulk operations.
//!
//! # Invariants
//! - Non-2xx outcomes are `StoreError::Response`; callers tolerate 404
//!   explicitly per call via `StoreResultExt::tolerate_not_found`.
//! - `bulk` and `mget` answers are positional: item `i` answers request `i`.
//! - Per-item bulk failures live inside the item, never in the request result.
//! - Writes carrying a `VersionPrecondition` are rejected with 409 when the
//!   stored `(seq_no, primary_term)` differs.

use crate::model::version::VersionPrecondition;
use crate::search::SearchQuery;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod query_eval;
pub mod script;
pub mod sqlite_store;

pub use crate::model::raw_doc::Document;
pub use script::StoreScript;
pub use sqlite_store::SqliteDocumentStore;

pub const VERSION_CONFLICT_EXCEPTION: &str = "version_conflict_engine_exception";
pub const DOCUMENT_MISSING_EXCEPTION: &str = "document_missing_exception";
pub const INDEX_NOT_FOUND_EXCEPTION: &str = "index_not_found_exception";
pub const NOT_FOUND: &str = "not_found";
pub const SCRIPT_EXCEPTION: &str = "script_exception";

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-side failure of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store answered with a non-2xx status.
    Response {
        status_code: u16,
        error_type: String,
        reason: String,
    },
    /// The request never produced a store answer.
    Transport(String),
}

impl StoreError {
    pub fn response(status_code: u16, error_type: &str, reason: impl Into<String>) -> Self {
        Self::Response {
            status_code,
            error_type: error_type.to_string(),
            reason: reason.into(),
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Response { status_code, .. } => Some(*status_code),
            Self::Transport(_) => None,
        }
    }

    pub fn error_type(&self) -> Option<&str> {
        match self {
            Self::Response { error_type, .. } => Some(error_type.as_str()),
            Self::Transport(_) => None,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Response { reason, .. } => reason.as_str(),
            Self::Transport(message) => message.as_str(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Response {
                status_code,
                error_type,
                reason,
            } => write!(f, "[{error_type}] {reason} (status {status_code})"),
            Self::Transport(message) => write!(f, "document store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {}

/// Explicit per-call tolerance of 404 answers.
pub trait StoreResultExt<T> {
    /// Maps a 404 answer to `Ok(None)`; every other failure is kept.
    fn tolerate_not_found(self) -> StoreResult<Option<T>>;
}

impl<T> StoreResultExt<T> for StoreResult<T> {
    fn tolerate_not_found(self) -> StoreResult<Option<T>> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Visibility of a write to subsequent searches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Refresh {
    True,
    False,
    #[default]
    WaitFor,
}

impl Refresh {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::WaitFor => "wait_for",
        }
    }
}

/// Successful store answer.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreResponse<B> {
    pub status_code: u16,
    pub body: B,
}

impl<B> StoreResponse<B> {
    pub fn ok(body: B) -> Self {
        Self {
            status_code: 200,
            body,
        }
    }

    pub fn created(body: B) -> Self {
        Self {
            status_code: 201,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetRequest {
    pub index: String,
    pub id: String,
}

/// Found document. A missing document or index is a 404 error.
#[derive(Debug, Clone, PartialEq)]
pub struct GetResponse {
    pub id: String,
    pub index: String,
    pub seq_no: i64,
    pub primary_term: i64,
    pub source: Document,
}

/// Full-document write used by `index` (upsert) and `create` (insert-only).
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub index: String,
    pub id: String,
    pub source: Document,
    pub precondition: Option<VersionPrecondition>,
    pub refresh: Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteResult {
    Created,
    Updated,
    Deleted,
    NotFound,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteResponse {
    pub id: String,
    pub index: String,
    pub seq_no: i64,
    pub primary_term: i64,
    pub result: WriteResult,
}

/// Partial update body.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateBody {
    /// Deep-merge these fields into the stored source.
    Doc(Document),
    /// Run a store-side script; insert `upsert` as-is when the document is missing.
    Script {
        script: StoreScript,
        upsert: Option<Document>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub index: String,
    pub id: String,
    pub body: UpdateBody,
    pub precondition: Option<VersionPrecondition>,
    pub refresh: Refresh,
    /// Return the post-update source in the response.
    pub return_source: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResponse {
    pub id: String,
    pub index: String,
    pub seq_no: i64,
    pub primary_term: i64,
    pub result: WriteResult,
    pub source: Option<Document>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub index: String,
    pub id: String,
    pub precondition: Option<VersionPrecondition>,
    pub refresh: Refresh,
}

/// One addressed document of a multi-get.
#[derive(Debug, Clone, PartialEq)]
pub struct MgetDocRequest {
    pub index: String,
    pub id: String,
    /// Dotted source paths to return; `None` returns the whole source.
    pub source_includes: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MgetDoc {
    pub id: String,
    pub index: String,
    pub found: bool,
    pub seq_no: Option<i64>,
    pub primary_term: Option<i64>,
    pub source: Option<Document>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MgetResponse {
    pub docs: Vec<MgetDoc>,
}

/// Addressing and precondition shared by every bulk operation.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkMeta {
    pub index: String,
    pub id: String,
    pub precondition: Option<VersionPrecondition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BulkOperation {
    Index { meta: BulkMeta, source: Document },
    Create { meta: BulkMeta, source: Document },
    Update { meta: BulkMeta, doc: Document },
}

impl BulkOperation {
    pub fn meta(&self) -> &BulkMeta {
        match self {
            Self::Index { meta, .. } | Self::Create { meta, .. } | Self::Update { meta, .. } => {
                meta
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkRequest {
    pub operations: Vec<BulkOperation>,
    pub refresh: Refresh,
    /// Source paths returned in each update item's `source`.
    pub update_source_includes: Option<Vec<String>>,
}

/// Failure of one bulk item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemFailure {
    pub error_type: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkResponseItem {
    pub id: String,
    pub index: String,
    pub status: u16,
    pub seq_no: Option<i64>,
    pub primary_term: Option<i64>,
    pub error: Option<BulkItemFailure>,
    pub source: Option<Document>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkWriteResponse {
    pub items: Vec<BulkResponseItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub indices: Vec<String>,
    pub query: SearchQuery,
    pub size: usize,
    pub from: usize,
    pub source_includes: Option<Vec<String>>,
    pub preference: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub index: String,
    pub score: f64,
    pub seq_no: i64,
    pub primary_term: i64,
    pub source: Document,
    pub sort: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    pub total: usize,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateByQueryRequest {
    pub indices: Vec<String>,
    pub query: SearchQuery,
    pub script: StoreScript,
    pub refresh: bool,
    /// Skip documents that changed concurrently instead of aborting.
    pub conflicts_proceed: bool,
}

/// Counters reported by an update-by-query run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateByQueryResponse {
    pub total: u64,
    pub updated: u64,
    pub deleted: u64,
    pub noops: u64,
    pub version_conflicts: u64,
}

/// Async client for the underlying document store.
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn get(&self, request: GetRequest) -> StoreResult<StoreResponse<GetResponse>>;
    /// Creates or replaces a document.
    async fn index(&self, request: WriteRequest) -> StoreResult<StoreResponse<WriteResponse>>;
    /// Creates a document; an existing id is a 409.
    async fn create(&self, request: WriteRequest) -> StoreResult<StoreResponse<WriteResponse>>;
    async fn update(&self, request: UpdateRequest) -> StoreResult<StoreResponse<UpdateResponse>>;
    async fn delete(&self, request: DeleteRequest) -> StoreResult<StoreResponse<WriteResponse>>;
    async fn mget(&self, docs: Vec<MgetDocRequest>) -> StoreResult<StoreResponse<MgetResponse>>;
    async fn bulk(&self, request: BulkRequest) -> StoreResult<StoreResponse<BulkWriteResponse>>;
    async fn search(&self, request: SearchRequest) -> StoreResult<StoreResponse<SearchResponse>>;
    async fn update_by_query(
        &self,
        request: UpdateByQueryRequest,
    ) -> StoreResult<StoreResponse<UpdateByQueryResponse>>;
}
