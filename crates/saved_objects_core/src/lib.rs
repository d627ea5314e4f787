//! Namespace-aware, versioned saved objects repository over a document store.
//! This crate is the single source of truth for tenant isolation and
//! optimistic concurrency of saved objects.

pub mod config;
pub mod db;
pub mod logging;
pub mod migration;
pub mod model;
pub mod namespace;
pub mod repo;
pub mod search;
pub mod serializer;
pub mod store;
pub mod types;

pub use config::{LogConfig, RepositoryConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use migration::{DocumentMigrator, MigrationError, VersionStampMigrator};
pub use model::saved_object::{
    Attributes, MigrationVersion, Permissions, Principals, SavedObject, SavedObjectReference,
};
pub use repo::{
    AddToNamespacesOptions, BaseOptions, BulkCreateObject, BulkCreateOptions, BulkGetObject,
    BulkItemError, BulkResponse, BulkUpdateObject, BulkUpdateOptions, CheckConflictsObject,
    CheckConflictsResponse, CreateOptions, DeleteByQueryOptions, DeleteFromNamespacesOptions,
    DeleteOptions, ErrorPayload, FindOptions, FindResponse, FindResult, IncrementCounterOptions,
    NamespacesResponse, RepoError, RepoResult, SavedObjectsRepository, UpdateOptions,
};
pub use search::{AttributeFilter, ReferenceFilter, SearchOperator, SortOrder};
pub use store::{Refresh, SqliteDocumentStore, StoreClient, StoreError, UpdateByQueryResponse};
pub use types::{NamespaceType, SavedObjectType, TypeRegistry};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
