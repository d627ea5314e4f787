//! Query-DSL building for saved object searches.
//!
//! # Responsibility
//! - Translate find options into a structured `SearchQuery`.
//! - Compute source-field projections for partial reads.

pub mod dsl;
pub mod query;

pub use dsl::{get_search_dsl, included_fields, SearchDslOptions};
pub use query::{
    AttributeFilter, NamespaceRule, ReferenceFilter, SearchOperator, SearchQuery, SortClause,
    SortOrder, TypeClause,
};
