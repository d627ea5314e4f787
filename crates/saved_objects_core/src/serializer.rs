//! Saved object ↔ raw document serialization.
//!
//! # Responsibility
//! - Derive the store-native document id from `(namespace, type, id)`.
//! - Convert write candidates into raw documents and raw documents back into
//!   saved object documents carrying a version token.
//!
//! # Invariants
//! - Only single-namespace types embed the namespace in the raw id, so
//!   multi-namespace objects are addressable from any namespace.
//! - `generate_raw_id` followed by id trimming returns the logical id.

use crate::model::raw_doc::{RawDoc, RawDocSource};
use crate::model::saved_object::SavedObjectDoc;
use crate::model::version::encode_hit_version;
use crate::types::TypeRegistry;
use std::sync::Arc;

/// Serializer bound to the type registry that decides id namespacing.
#[derive(Debug, Clone)]
pub struct SavedObjectsSerializer {
    registry: Arc<TypeRegistry>,
}

impl SavedObjectsSerializer {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }

    /// Builds the raw document id.
    ///
    /// Single-namespace types in a non-default namespace get a
    /// `"{namespace}:"` prefix; every id gets a `"{type}:"` prefix.
    pub fn generate_raw_id(&self, namespace: Option<&str>, type_name: &str, id: &str) -> String {
        format!("{}{type_name}:{id}", self.namespace_prefix(namespace, type_name))
    }

    /// Converts a migrated candidate into its raw document.
    pub fn saved_object_to_raw(&self, doc: &SavedObjectDoc) -> RawDoc {
        let mut source = RawDocSource::new(doc.type_name.clone());
        source.attributes = Some(doc.attributes.clone());
        source.references = Some(doc.references.clone());
        source.namespace = doc.namespace.clone();
        source.namespaces = doc.namespaces.clone();
        source.origin_id = doc.origin_id.clone();
        source.migration_version = doc.migration_version.clone();
        source.updated_at = doc.updated_at.clone();
        source.workspaces = doc.workspaces.clone();
        source.permissions = doc.permissions.clone();

        RawDoc {
            id: self.generate_raw_id(doc.namespace.as_deref(), &doc.type_name, &doc.id),
            source,
            seq_no: None,
            primary_term: None,
        }
    }

    /// Converts a stored raw document back into a saved object document.
    pub fn raw_to_saved_object(&self, raw: &RawDoc) -> SavedObjectDoc {
        let source = &raw.source;
        let namespace = if self.registry.is_single_namespace(&source.type_name) {
            source.namespace.clone()
        } else {
            None
        };
        let prefix = format!(
            "{}{}:",
            self.namespace_prefix(namespace.as_deref(), &source.type_name),
            source.type_name
        );
        let id = raw
            .id
            .strip_prefix(prefix.as_str())
            .unwrap_or(raw.id.as_str())
            .to_string();

        SavedObjectDoc {
            id,
            type_name: source.type_name.clone(),
            namespace,
            namespaces: source.namespaces.clone(),
            origin_id: source.origin_id.clone(),
            attributes: source
                .attributes
                .clone()
                .unwrap_or(serde_json::Value::Null),
            migration_version: source.migration_version.clone(),
            updated_at: source.updated_at.clone(),
            references: source.references.clone().unwrap_or_default(),
            workspaces: source.workspaces.clone(),
            permissions: source.permissions.clone(),
            version: encode_hit_version(raw.seq_no, raw.primary_term),
        }
    }

    fn namespace_prefix(&self, namespace: Option<&str>, type_name: &str) -> String {
        match namespace {
            Some(namespace) if self.registry.is_single_namespace(type_name) => {
                format!("{namespace}:")
            }
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SavedObjectsSerializer;
    use crate::model::saved_object::SavedObjectDoc;
    use crate::model::version::encode_version;
    use crate::types::{NamespaceType, SavedObjectType, TypeRegistry};
    use serde_json::json;
    use std::sync::Arc;

    fn serializer() -> SavedObjectsSerializer {
        let mut registry = TypeRegistry::new();
        for (name, namespace_type) in [
            ("dashboard", NamespaceType::Single),
            ("space-obj", NamespaceType::Multiple),
            ("config", NamespaceType::Agnostic),
        ] {
            registry
                .register(SavedObjectType::new(name, namespace_type))
                .unwrap();
        }
        SavedObjectsSerializer::new(Arc::new(registry))
    }

    #[test]
    fn raw_id_embeds_namespace_only_for_single_namespace_types() {
        let serializer = serializer();
        assert_eq!(
            serializer.generate_raw_id(Some("ns1"), "dashboard", "d1"),
            "ns1:dashboard:d1"
        );
        assert_eq!(serializer.generate_raw_id(None, "dashboard", "d1"), "dashboard:d1");
        assert_eq!(
            serializer.generate_raw_id(Some("ns1"), "space-obj", "o1"),
            "space-obj:o1"
        );
        assert_eq!(
            serializer.generate_raw_id(Some("ns1"), "config", "c1"),
            "config:c1"
        );
    }

    #[test]
    fn raw_ids_do_not_collide_across_namespaces() {
        let serializer = serializer();
        let a = serializer.generate_raw_id(Some("a"), "dashboard", "x");
        let b = serializer.generate_raw_id(Some("b"), "dashboard", "x");
        let default = serializer.generate_raw_id(None, "dashboard", "x");
        assert_ne!(a, b);
        assert_ne!(a, default);
    }

    #[test]
    fn raw_round_trip_restores_logical_id_and_encodes_version() {
        let serializer = serializer();
        let mut doc = SavedObjectDoc::new("d1", "dashboard", json!({ "title": "A" }));
        doc.namespace = Some("ns1".to_string());

        let mut raw = serializer.saved_object_to_raw(&doc);
        assert_eq!(raw.id, "ns1:dashboard:d1");
        raw.seq_no = Some(3);
        raw.primary_term = Some(1);

        let decoded = serializer.raw_to_saved_object(&raw);
        assert_eq!(decoded.id, "d1");
        assert_eq!(decoded.namespace.as_deref(), Some("ns1"));
        assert_eq!(decoded.attributes, json!({ "title": "A" }));
        assert_eq!(decoded.version, Some(encode_version(3, 1)));
    }

    #[test]
    fn multi_namespace_documents_store_namespace_list() {
        let serializer = serializer();
        let mut doc = SavedObjectDoc::new("o1", "space-obj", json!({}));
        doc.namespaces = Some(vec!["default".to_string(), "ns2".to_string()]);

        let raw = serializer.saved_object_to_raw(&doc);
        assert_eq!(raw.id, "space-obj:o1");
        assert_eq!(raw.source.namespace, None);
        assert_eq!(raw.source.namespaces, doc.namespaces);
        assert_eq!(serializer.raw_to_saved_object(&raw).id, "o1");
    }
}
