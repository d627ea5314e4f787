//! Option and response types of the repository operations.

use crate::model::saved_object::{
    Attributes, MigrationVersion, Permissions, SavedObject, SavedObjectReference,
};
use crate::repo::error::BulkItemError;
use crate::search::{AttributeFilter, ReferenceFilter, SearchOperator, SortOrder};
use crate::store::Refresh;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options shared by read-only operations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseOptions {
    pub namespace: Option<String>,
}

impl BaseOptions {
    pub fn in_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateOptions {
    /// Generated when absent.
    pub id: Option<String>,
    /// Replace an existing document with the same id instead of failing.
    pub overwrite: bool,
    /// Expected version of the overwritten document.
    pub version: Option<String>,
    pub references: Option<Vec<SavedObjectReference>>,
    pub migration_version: Option<MigrationVersion>,
    pub origin_id: Option<String>,
    /// Namespaces of a new multi-namespace object; replaces the current namespace.
    pub initial_namespaces: Option<Vec<String>>,
    pub workspaces: Option<Vec<String>>,
    pub permissions: Option<Permissions>,
    pub refresh: Option<Refresh>,
    pub namespace: Option<String>,
}

/// One object of a `bulk_create` call.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkCreateObject {
    pub id: Option<String>,
    pub type_name: String,
    pub attributes: Attributes,
    pub version: Option<String>,
    pub references: Option<Vec<SavedObjectReference>>,
    pub migration_version: Option<MigrationVersion>,
    pub origin_id: Option<String>,
    pub initial_namespaces: Option<Vec<String>>,
    pub workspaces: Option<Vec<String>>,
    pub permissions: Option<Permissions>,
}

impl BulkCreateObject {
    pub fn new(type_name: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: None,
            type_name: type_name.into(),
            attributes,
            version: None,
            references: None,
            migration_version: None,
            origin_id: None,
            initial_namespaces: None,
            workspaces: None,
            permissions: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkCreateOptions {
    pub overwrite: bool,
    pub refresh: Option<Refresh>,
    pub namespace: Option<String>,
    /// Workspaces stamped on objects written with `create` semantics.
    pub workspaces: Option<Vec<String>>,
}

/// Per-item results of a bulk call, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkResponse {
    pub saved_objects: Vec<Result<SavedObject, BulkItemError>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConflictsObject {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl CheckConflictsObject {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckConflictsResponse {
    pub errors: Vec<BulkItemError>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkGetObject {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Attribute fields to return; all when absent.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

impl BulkGetObject {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            fields: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub version: Option<String>,
    pub references: Option<Vec<SavedObjectReference>>,
    pub permissions: Option<Permissions>,
    pub refresh: Option<Refresh>,
    pub namespace: Option<String>,
}

/// One object of a `bulk_update` call.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkUpdateObject {
    pub id: String,
    pub type_name: String,
    /// Partial attributes merged into the stored ones.
    pub attributes: Attributes,
    pub version: Option<String>,
    pub references: Option<Vec<SavedObjectReference>>,
    /// Namespace string that supersedes the operation namespace for this item.
    pub namespace: Option<String>,
    pub permissions: Option<Permissions>,
}

impl BulkUpdateObject {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            attributes,
            version: None,
            references: None,
            namespace: None,
            permissions: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkUpdateOptions {
    pub refresh: Option<Refresh>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub refresh: Option<Refresh>,
    /// Delete a multi-namespace object even when it is shared to other namespaces.
    pub force: bool,
    pub namespace: Option<String>,
}

/// Options of `delete_by_namespace` and `delete_by_workspace`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteByQueryOptions {
    pub refresh: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddToNamespacesOptions {
    pub version: Option<String>,
    pub namespace: Option<String>,
    pub refresh: Option<Refresh>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteFromNamespacesOptions {
    pub namespace: Option<String>,
    pub refresh: Option<Refresh>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacesResponse {
    pub namespaces: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncrementCounterOptions {
    pub migration_version: Option<MigrationVersion>,
    pub refresh: Option<Refresh>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub types: Option<Vec<String>>,
    /// Per-type namespaces; mutually exclusive with `types`.
    pub type_to_namespaces_map: Option<BTreeMap<String, Option<Vec<String>>>>,
    pub namespaces: Option<Vec<String>>,
    pub search: Option<String>,
    pub default_search_operator: SearchOperator,
    pub search_fields: Option<Vec<String>>,
    pub root_search_fields: Option<Vec<String>>,
    pub has_reference: Option<ReferenceFilter>,
    /// 1-based page number.
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub sort_field: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub fields: Option<Vec<String>>,
    pub filter: Vec<AttributeFilter>,
    pub preference: Option<String>,
    pub workspaces: Option<Vec<String>>,
}

impl FindOptions {
    pub fn for_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: Some(types.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }
}

/// One hit of a `find` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindResult {
    #[serde(flatten)]
    pub saved_object: SavedObject,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindResponse {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub saved_objects: Vec<FindResult>,
}
