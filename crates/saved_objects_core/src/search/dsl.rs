//! Find options to `SearchQuery` translation.
//!
//! # Responsibility
//! - Resolve per-type namespace rules from the type registry.
//! - Normalize search fields and sort fields into source paths.
//!
//! # Invariants
//! - Omitted namespaces mean the default tenant, never "all namespaces".
//! - Multi-type sorts only accept root properties.

use crate::namespace::{ALL_NAMESPACES_STRING, DEFAULT_NAMESPACE_STRING};
use crate::model::raw_doc::{
    SOURCE_MIGRATION_VERSION, SOURCE_NAMESPACE, SOURCE_NAMESPACES, SOURCE_ORIGIN_ID,
    SOURCE_PERMISSIONS, SOURCE_REFERENCES, SOURCE_TYPE, SOURCE_UPDATED_AT, SOURCE_WORKSPACES,
};
use crate::repo::error::{RepoError, RepoResult};
use crate::search::query::{
    AttributeFilter, NamespaceRule, ReferenceFilter, SearchOperator, SearchQuery, SortClause,
    SortOrder, TypeClause,
};
use crate::types::TypeRegistry;
use std::collections::BTreeMap;

const ROOT_SORT_FIELDS: [&str; 3] = [SOURCE_TYPE, SOURCE_UPDATED_AT, SOURCE_ORIGIN_ID];

/// Input of `get_search_dsl`.
#[derive(Debug, Clone, Default)]
pub struct SearchDslOptions {
    pub types: Vec<String>,
    pub namespaces: Option<Vec<String>>,
    /// Per-type namespaces; a `None` entry means the default tenant.
    pub type_to_namespaces_map: Option<BTreeMap<String, Option<Vec<String>>>>,
    pub search: Option<String>,
    pub default_search_operator: SearchOperator,
    pub search_fields: Option<Vec<String>>,
    pub root_search_fields: Option<Vec<String>>,
    pub has_reference: Option<ReferenceFilter>,
    pub filters: Vec<AttributeFilter>,
    pub sort_field: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub workspaces: Option<Vec<String>>,
}

/// Builds the structured query for a find or update-by-query call.
///
/// # Errors
/// - Returns `BadRequest` when no type is given.
/// - Returns `BadRequest` when `sort_order` is given without `sort_field`.
/// - Returns `BadRequest` when several types are sorted by a non-root field.
pub fn get_search_dsl(
    registry: &TypeRegistry,
    options: &SearchDslOptions,
) -> RepoResult<SearchQuery> {
    if options.types.is_empty() {
        return Err(RepoError::bad_request("type must be specified"));
    }
    if options.sort_order.is_some() && options.sort_field.is_none() {
        return Err(RepoError::bad_request("sortOrder requires a sortField"));
    }

    let type_clauses = options
        .types
        .iter()
        .map(|type_name| {
            let namespaces = match &options.type_to_namespaces_map {
                Some(map) => map.get(type_name).cloned().flatten(),
                None => options.namespaces.clone(),
            };
            TypeClause {
                type_name: type_name.clone(),
                rule: namespace_rule(registry, type_name, namespaces.as_deref()),
            }
        })
        .collect();

    let mut search_paths = Vec::new();
    for field in options.search_fields.iter().flatten() {
        let field = strip_boost(field);
        for type_name in &options.types {
            search_paths.push(format!("{type_name}.{field}"));
        }
    }
    search_paths.extend(
        options
            .root_search_fields
            .iter()
            .flatten()
            .map(|field| strip_boost(field).to_string()),
    );

    let sort = match &options.sort_field {
        Some(field) => Some(SortClause {
            path: sort_path(&options.types, field)?,
            order: options.sort_order.unwrap_or_default(),
        }),
        None => None,
    };

    Ok(SearchQuery {
        type_clauses,
        search: options
            .search
            .as_ref()
            .map(|search| search.trim().to_string())
            .filter(|search| !search.is_empty()),
        search_operator: options.default_search_operator,
        search_paths,
        has_reference: options.has_reference.clone(),
        filters: options.filters.clone(),
        workspaces: options.workspaces.clone(),
        sort,
    })
}

/// Source paths to request when only some attribute fields are wanted.
///
/// Returns `None` when every field should be returned.
pub fn included_fields(types: &[String], fields: Option<&[String]>) -> Option<Vec<String>> {
    let fields = fields.filter(|fields| !fields.is_empty())?;

    let mut included: Vec<String> = types
        .iter()
        .flat_map(|type_name| fields.iter().map(move |field| format!("{type_name}.{field}")))
        .collect();
    included.extend(
        [
            SOURCE_NAMESPACE,
            SOURCE_NAMESPACES,
            SOURCE_TYPE,
            SOURCE_REFERENCES,
            SOURCE_MIGRATION_VERSION,
            SOURCE_UPDATED_AT,
            SOURCE_ORIGIN_ID,
            SOURCE_WORKSPACES,
            SOURCE_PERMISSIONS,
        ]
        .map(String::from),
    );
    included.extend(fields.iter().cloned());
    Some(included)
}

fn namespace_rule(
    registry: &TypeRegistry,
    type_name: &str,
    namespaces: Option<&[String]>,
) -> NamespaceRule {
    if registry.is_namespace_agnostic(type_name) {
        return NamespaceRule::Any;
    }

    let default = [DEFAULT_NAMESPACE_STRING.to_string()];
    let namespaces = namespaces
        .filter(|namespaces| !namespaces.is_empty())
        .unwrap_or(&default);
    if namespaces.iter().any(|value| value == ALL_NAMESPACES_STRING) {
        return NamespaceRule::Any;
    }

    if registry.is_multi_namespace(type_name) {
        NamespaceRule::MultiIn(namespaces.to_vec())
    } else {
        NamespaceRule::SingleIn(
            namespaces
                .iter()
                .map(|value| (value != DEFAULT_NAMESPACE_STRING).then(|| value.clone()))
                .collect(),
        )
    }
}

fn sort_path(types: &[String], field: &str) -> RepoResult<String> {
    if ROOT_SORT_FIELDS.contains(&field) {
        return Ok(field.to_string());
    }
    match types {
        [type_name] => Ok(format!("{type_name}.{field}")),
        _ => Err(RepoError::bad_request(format!(
            "Unable to sort multiple types by field {field}, not a root property"
        ))),
    }
}

fn strip_boost(field: &str) -> &str {
    field.split('^').next().unwrap_or(field)
}
