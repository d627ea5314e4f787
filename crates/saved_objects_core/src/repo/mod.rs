//! Saved objects repository.
//!
//! # Responsibility
//! - Offer namespace-aware CRUD, bulk and search operations over a
//!   `StoreClient`.
//! - Map store outcomes into the `RepoError` taxonomy.
//!
//! # Invariants
//! - Bulk results are positional: output `i` answers input `i`.
//! - Writes that carry a version, or follow a preflight read, are conditional
//!   on the store's `(seq_no, primary_term)`.

pub mod bulk;
pub mod error;
pub mod options;
mod preflight;
pub mod repository;

pub use error::{BulkItemError, ErrorMetadata, ErrorPayload, RepoError, RepoResult};
pub use options::{
    AddToNamespacesOptions, BaseOptions, BulkCreateObject, BulkCreateOptions, BulkGetObject,
    BulkResponse, BulkUpdateObject, BulkUpdateOptions, CheckConflictsObject,
    CheckConflictsResponse, CreateOptions, DeleteByQueryOptions, DeleteFromNamespacesOptions,
    DeleteOptions, FindOptions, FindResponse, FindResult, IncrementCounterOptions,
    NamespacesResponse, UpdateOptions,
};
pub use repository::SavedObjectsRepository;
