//! Namespace policy.
//!
//! # Responsibility
//! - Normalize caller-supplied namespaces into their internal id form.
//! - Compute the namespace set a written document belongs to.
//! - Decide whether a stored document is visible from a namespace.
//!
//! # Invariants
//! - The default tenant is `None` internally and `"default"` as a string.
//! - The `"*"` wildcard is never accepted as an operation target.
//! - Single-namespace and agnostic documents rely on raw-id isolation, so
//!   visibility checks only inspect multi-namespace documents.

use crate::model::raw_doc::RawDocSource;
use crate::repo::error::{RepoError, RepoResult};
use crate::types::TypeRegistry;

/// String form of the implicit default tenant.
pub const DEFAULT_NAMESPACE_STRING: &str = "default";
/// Wildcard meaning "all namespaces"; only valid as a membership result.
pub const ALL_NAMESPACES_STRING: &str = "*";

/// Converts a namespace id into its string form.
pub fn namespace_id_to_string(namespace: Option<&str>) -> String {
    namespace.unwrap_or(DEFAULT_NAMESPACE_STRING).to_string()
}

/// Converts a namespace string into its id form (`"default"` becomes `None`).
///
/// # Errors
/// - Returns `BadRequest` for an empty string.
pub fn namespace_string_to_id(namespace: &str) -> RepoResult<Option<String>> {
    if namespace.is_empty() {
        return Err(RepoError::bad_request("namespace cannot be an empty string"));
    }
    if namespace == DEFAULT_NAMESPACE_STRING {
        return Ok(None);
    }
    Ok(Some(namespace.to_string()))
}

/// Normalizes an operation namespace.
///
/// # Errors
/// - Returns `BadRequest` for the `"*"` wildcard or an empty string.
pub fn normalize_namespace(namespace: Option<&str>) -> RepoResult<Option<String>> {
    match namespace {
        None => Ok(None),
        Some(ALL_NAMESPACES_STRING) => Err(RepoError::bad_request(
            "\"options.namespace\" cannot be \"*\"",
        )),
        Some(value) => namespace_string_to_id(value),
    }
}

/// Computes the namespace set for a document about to be written.
///
/// Precedence: explicitly requested namespaces, then the stored namespaces of
/// an existing document, then the current namespace alone. An existing
/// document without a `namespaces` field yields `None`; it is not repaired.
pub fn namespaces_of(
    existing: Option<&RawDocSource>,
    requested: Option<&[String]>,
    current: Option<&str>,
) -> Option<Vec<String>> {
    if let Some(requested) = requested {
        return Some(requested.to_vec());
    }
    match existing {
        Some(source) => source.namespaces.clone(),
        None => Some(vec![namespace_id_to_string(current)]),
    }
}

/// Returns whether a stored document is visible from `namespace`.
///
/// Only meaningful for documents read back from the store, where the raw-id
/// format already isolates non-multi-namespace types.
pub fn exists_in_namespace(
    registry: &TypeRegistry,
    source: &RawDocSource,
    namespace: Option<&str>,
) -> bool {
    if !registry.is_multi_namespace(&source.type_name) {
        return true;
    }

    let target = namespace_id_to_string(namespace);
    source.namespaces.as_ref().is_some_and(|namespaces| {
        namespaces
            .iter()
            .any(|value| *value == target || value == ALL_NAMESPACES_STRING)
    })
}

/// Deduplicates namespaces while keeping first-seen order.
pub fn unique_namespaces<I>(namespaces: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut unique: Vec<String> = Vec::new();
    for namespace in namespaces {
        if !unique.contains(&namespace) {
            unique.push(namespace);
        }
    }
    unique
}
