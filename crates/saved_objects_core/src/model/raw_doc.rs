//! Store-native raw document shape.
//!
//! # Responsibility
//! - Describe the `_source` body persisted for each saved object.
//! - Convert between the typed source and the untyped JSON document the
//!   store client exchanges.
//!
//! # Invariants
//! - Attributes live under a key equal to the object's type name.
//! - Absent optional fields are omitted from the JSON document, never written as `null`.

use crate::model::saved_object::{
    Attributes, MigrationVersion, Permissions, SavedObjectReference,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Untyped JSON document body as stored.
pub type Document = Map<String, Value>;

pub const SOURCE_TYPE: &str = "type";
pub const SOURCE_NAMESPACE: &str = "namespace";
pub const SOURCE_NAMESPACES: &str = "namespaces";
pub const SOURCE_ORIGIN_ID: &str = "originId";
pub const SOURCE_UPDATED_AT: &str = "updated_at";
pub const SOURCE_REFERENCES: &str = "references";
pub const SOURCE_MIGRATION_VERSION: &str = "migrationVersion";
pub const SOURCE_WORKSPACES: &str = "workspaces";
pub const SOURCE_PERMISSIONS: &str = "permissions";

/// Stored document failed to decode into a raw saved object source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocError(pub String);

impl Display for RawDocError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid raw saved object document: {}", self.0)
    }
}

impl Error for RawDocError {}

/// Typed `_source` of a raw saved object document.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocSource {
    pub type_name: String,
    pub namespace: Option<String>,
    pub namespaces: Option<Vec<String>>,
    pub origin_id: Option<String>,
    pub updated_at: Option<String>,
    pub references: Option<Vec<SavedObjectReference>>,
    pub migration_version: Option<MigrationVersion>,
    pub workspaces: Option<Vec<String>>,
    pub permissions: Option<Permissions>,
    pub attributes: Option<Attributes>,
}

impl RawDocSource {
    /// Creates a source carrying only the type name.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            namespace: None,
            namespaces: None,
            origin_id: None,
            updated_at: None,
            references: None,
            migration_version: None,
            workspaces: None,
            permissions: None,
            attributes: None,
        }
    }

    /// Encodes this source as the JSON document written to the store.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(SOURCE_TYPE.to_string(), Value::String(self.type_name.clone()));
        if let Some(attributes) = &self.attributes {
            doc.insert(self.type_name.clone(), attributes.clone());
        }
        insert_opt(&mut doc, SOURCE_NAMESPACE, &self.namespace);
        insert_opt(&mut doc, SOURCE_NAMESPACES, &self.namespaces);
        insert_opt(&mut doc, SOURCE_ORIGIN_ID, &self.origin_id);
        insert_opt(&mut doc, SOURCE_UPDATED_AT, &self.updated_at);
        insert_opt(&mut doc, SOURCE_REFERENCES, &self.references);
        insert_opt(&mut doc, SOURCE_MIGRATION_VERSION, &self.migration_version);
        insert_opt(&mut doc, SOURCE_WORKSPACES, &self.workspaces);
        insert_opt(&mut doc, SOURCE_PERMISSIONS, &self.permissions);
        doc
    }

    /// Decodes a stored JSON document.
    ///
    /// # Errors
    /// - Returns an error when `type` is missing or not a string.
    /// - Returns an error when a known field has the wrong shape.
    pub fn from_document(doc: &Document) -> Result<Self, RawDocError> {
        let type_name = doc
            .get(SOURCE_TYPE)
            .and_then(Value::as_str)
            .ok_or_else(|| RawDocError("missing string field `type`".to_string()))?
            .to_string();

        Ok(Self {
            attributes: doc.get(&type_name).cloned(),
            namespace: read_opt(doc, SOURCE_NAMESPACE)?,
            namespaces: read_opt(doc, SOURCE_NAMESPACES)?,
            origin_id: read_opt(doc, SOURCE_ORIGIN_ID)?,
            updated_at: read_opt(doc, SOURCE_UPDATED_AT)?,
            references: read_opt(doc, SOURCE_REFERENCES)?,
            migration_version: read_opt(doc, SOURCE_MIGRATION_VERSION)?,
            workspaces: read_opt(doc, SOURCE_WORKSPACES)?,
            permissions: read_opt(doc, SOURCE_PERMISSIONS)?,
            type_name,
        })
    }
}

/// Raw saved object document as addressed in the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDoc {
    pub id: String,
    pub source: RawDocSource,
    pub seq_no: Option<i64>,
    pub primary_term: Option<i64>,
}

fn insert_opt<T: Serialize>(doc: &mut Document, key: &str, value: &Option<T>) {
    if let Some(value) = value {
        if let Ok(encoded) = serde_json::to_value(value) {
            doc.insert(key.to_string(), encoded);
        }
    }
}

fn read_opt<T: DeserializeOwned>(doc: &Document, key: &str) -> Result<Option<T>, RawDocError> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|err| RawDocError(format!("field `{key}`: {err}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::{RawDocSource, SOURCE_NAMESPACES};
    use serde_json::json;

    #[test]
    fn document_keeps_attributes_under_type_key_and_omits_unset_fields() {
        let mut source = RawDocSource::new("dashboard");
        source.attributes = Some(json!({ "title": "A" }));
        source.namespaces = Some(vec!["default".to_string()]);

        let doc = source.to_document();
        assert_eq!(doc["type"], json!("dashboard"));
        assert_eq!(doc["dashboard"], json!({ "title": "A" }));
        assert_eq!(doc[SOURCE_NAMESPACES], json!(["default"]));
        assert!(!doc.contains_key("namespace"));
        assert!(!doc.contains_key("permissions"));

        let decoded = RawDocSource::from_document(&doc).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn from_document_rejects_missing_type() {
        let doc = json!({ "dashboard": {} });
        let err = RawDocSource::from_document(doc.as_object().unwrap()).unwrap_err();
        assert!(err.to_string().contains("type"));
    }

    #[test]
    fn from_document_rejects_malformed_namespaces() {
        let doc = json!({ "type": "dashboard", "namespaces": "default" });
        let err = RawDocSource::from_document(doc.as_object().unwrap()).unwrap_err();
        assert!(err.to_string().contains("namespaces"));
    }
}
