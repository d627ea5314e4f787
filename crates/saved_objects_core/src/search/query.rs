//! Structured search query model.
//!
//! # Responsibility
//! - Describe `find` and update-by-query selections in a store-neutral form.
//!
//! # Invariants
//! - A document matches only through one of `type_clauses`; an empty clause
//!   list matches nothing.
//! - Namespace rules are already resolved per type classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Boolean combination of search terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SearchOperator {
    #[default]
    Or,
    And,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Reference that matching objects must carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFilter {
    #[serde(rename = "type")]
    pub type_name: String,
    pub id: String,
}

impl ReferenceFilter {
    pub fn new(type_name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
        }
    }
}

/// Attribute equality filter (`{type}.attributes.{attribute} == value`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeFilter {
    #[serde(rename = "type")]
    pub type_name: String,
    pub attribute: String,
    pub value: Value,
}

impl AttributeFilter {
    pub fn new(type_name: impl Into<String>, attribute: impl Into<String>, value: Value) -> Self {
        Self {
            type_name: type_name.into(),
            attribute: attribute.into(),
            value,
        }
    }
}

/// Namespace condition of one type clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceRule {
    /// No namespace condition (agnostic types, or the `"*"` search).
    Any,
    /// Stored `namespace` field is one of these ids (`None` is the default tenant).
    SingleIn(Vec<Option<String>>),
    /// Stored `namespaces` list intersects these strings, or holds `"*"`.
    MultiIn(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeClause {
    pub type_name: String,
    pub rule: NamespaceRule,
}

/// Sort on a source path (`updated_at`, `type`, or `{type}.{attribute}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortClause {
    pub path: String,
    pub order: SortOrder,
}

/// Store-neutral selection over raw saved object documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub type_clauses: Vec<TypeClause>,
    /// Simple query string; `None` matches every document.
    pub search: Option<String>,
    pub search_operator: SearchOperator,
    /// Source paths searched; empty searches every attribute string.
    pub search_paths: Vec<String>,
    pub has_reference: Option<ReferenceFilter>,
    pub filters: Vec<AttributeFilter>,
    pub workspaces: Option<Vec<String>>,
    pub sort: Option<SortClause>,
}
