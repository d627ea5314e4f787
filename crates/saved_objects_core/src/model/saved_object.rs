//! Saved object records.
//!
//! # Responsibility
//! - Define `SavedObject`, the record returned to repository callers.
//! - Define `SavedObjectDoc`, the candidate handed to migration and
//!   serialization before every write.
//!
//! # Invariants
//! - `attributes` is opaque to the repository; only the owning type knows its shape.
//! - Optional document fields (`namespace`, `namespaces`, `permissions`, ...)
//!   are independently nullable and never inferred from one another.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type-owned attribute payload.
pub type Attributes = serde_json::Value;

/// Per-type migration version markers, keyed by type name.
pub type MigrationVersion = BTreeMap<String, String>;

/// Principals granted one permission mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
}

/// Permission modes (`read`, `write`, ...) mapped to granted principals.
pub type Permissions = BTreeMap<String, Principals>;

/// Named link from one saved object to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedObjectReference {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: String,
}

impl SavedObjectReference {
    pub fn new(
        name: impl Into<String>,
        type_name: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            id: id.into(),
        }
    }
}

/// Saved object as returned to repository callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedObject {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Namespaces the object is visible from. Empty for namespace-agnostic types.
    #[serde(default)]
    pub namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_id: Option<String>,
    #[serde(
        rename = "updated_at",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<String>,
    /// Opaque optimistic-concurrency token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub attributes: Attributes,
    #[serde(default)]
    pub references: Vec<SavedObjectReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_version: Option<MigrationVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
}

/// Write candidate passed through migration and serialization.
///
/// Single-namespace types carry `namespace`; multi-namespace types carry
/// `namespaces`. Namespace-agnostic types carry neither.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedObjectDoc {
    pub id: String,
    pub type_name: String,
    pub namespace: Option<String>,
    pub namespaces: Option<Vec<String>>,
    pub origin_id: Option<String>,
    pub attributes: Attributes,
    pub migration_version: Option<MigrationVersion>,
    pub updated_at: Option<String>,
    pub references: Vec<SavedObjectReference>,
    pub workspaces: Option<Vec<String>>,
    pub permissions: Option<Permissions>,
    /// Populated only when decoded from a stored document.
    pub version: Option<String>,
}

impl SavedObjectDoc {
    /// Creates a candidate with every optional field unset.
    pub fn new(id: impl Into<String>, type_name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            namespace: None,
            namespaces: None,
            origin_id: None,
            attributes,
            migration_version: None,
            updated_at: None,
            references: Vec::new(),
            workspaces: None,
            permissions: None,
            version: None,
        }
    }
}
