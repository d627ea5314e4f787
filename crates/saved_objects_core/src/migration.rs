//! Document migration applied before every write.
//!
//! # Responsibility
//! - Define the migrator seam the repository calls on each write candidate.
//! - Provide a migrator that stamps per-type document versions and refuses
//!   documents written by a newer schema.
//!
//! # Invariants
//! - Migration never changes `id` or `type`.
//! - A document carrying a newer version than supported is rejected, never downgraded.

use crate::model::saved_object::{MigrationVersion, SavedObjectDoc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Migration failure for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    /// Version marker is not dot-separated numbers.
    InvalidVersion { type_name: String, version: String },
    /// Document was produced by a newer schema than this process knows.
    NewerThanSupported {
        type_name: String,
        document_version: String,
        latest_supported: String,
    },
}

impl Display for MigrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidVersion { type_name, version } => write!(
                f,
                "Document \"{type_name}\" has invalid migration version `{version}`"
            ),
            Self::NewerThanSupported {
                type_name,
                document_version,
                latest_supported,
            } => write!(
                f,
                "Document \"{type_name}\" has property \"{type_name}\" which belongs to a more recent version ({document_version}) than supported ({latest_supported})"
            ),
        }
    }
}

impl Error for MigrationError {}

/// Upgrades a write candidate to the current document shape.
pub trait DocumentMigrator: Send + Sync {
    fn migrate_document(&self, doc: SavedObjectDoc) -> Result<SavedObjectDoc, MigrationError>;
}

/// Migrator that records the current version of each configured type.
///
/// Types without a configured version pass through untouched.
#[derive(Debug, Clone, Default)]
pub struct VersionStampMigrator {
    current_versions: BTreeMap<String, String>,
}

impl VersionStampMigrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the latest document version of one type.
    pub fn with_type_version(
        mut self,
        type_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.current_versions.insert(type_name.into(), version.into());
        self
    }
}

impl DocumentMigrator for VersionStampMigrator {
    fn migrate_document(&self, mut doc: SavedObjectDoc) -> Result<SavedObjectDoc, MigrationError> {
        let Some(latest) = self.current_versions.get(&doc.type_name) else {
            return Ok(doc);
        };

        let document_version = doc
            .migration_version
            .as_ref()
            .and_then(|versions| versions.get(&doc.type_name))
            .cloned();
        if let Some(document_version) = document_version {
            if compare_versions(&doc.type_name, &document_version, latest)? == Ordering::Greater {
                return Err(MigrationError::NewerThanSupported {
                    type_name: doc.type_name.clone(),
                    document_version,
                    latest_supported: latest.clone(),
                });
            }
        }

        doc.migration_version
            .get_or_insert_with(MigrationVersion::new)
            .insert(doc.type_name.clone(), latest.clone());
        Ok(doc)
    }
}

fn compare_versions(type_name: &str, left: &str, right: &str) -> Result<Ordering, MigrationError> {
    let left_parts = parse_version(type_name, left)?;
    let right_parts = parse_version(type_name, right)?;
    Ok(left_parts.cmp(&right_parts))
}

fn parse_version(type_name: &str, version: &str) -> Result<Vec<u64>, MigrationError> {
    let invalid = || MigrationError::InvalidVersion {
        type_name: type_name.to_string(),
        version: version.to_string(),
    };

    let mut parts = version
        .split('.')
        .map(|part| part.parse::<u64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    while parts.len() > 1 && parts.last() == Some(&0) {
        parts.pop();
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::{DocumentMigrator, MigrationError, VersionStampMigrator};
    use crate::model::saved_object::{MigrationVersion, SavedObjectDoc};
    use serde_json::json;

    fn doc_with_version(version: Option<&str>) -> SavedObjectDoc {
        let mut doc = SavedObjectDoc::new("d1", "dashboard", json!({}));
        doc.migration_version = version.map(|value| {
            let mut versions = MigrationVersion::new();
            versions.insert("dashboard".to_string(), value.to_string());
            versions
        });
        doc
    }

    #[test]
    fn stamps_latest_version_when_missing_or_older() {
        let migrator = VersionStampMigrator::new().with_type_version("dashboard", "7.9.3");

        for version in [None, Some("7.0.0"), Some("7.9.3")] {
            let migrated = migrator.migrate_document(doc_with_version(version)).unwrap();
            assert_eq!(
                migrated.migration_version.unwrap()["dashboard"],
                "7.9.3".to_string()
            );
        }
    }

    #[test]
    fn rejects_documents_from_newer_schema() {
        let migrator = VersionStampMigrator::new().with_type_version("dashboard", "7.9.3");
        let err = migrator
            .migrate_document(doc_with_version(Some("7.10.0")))
            .unwrap_err();
        assert!(matches!(err, MigrationError::NewerThanSupported { .. }));
    }

    #[test]
    fn rejects_unparsable_versions() {
        let migrator = VersionStampMigrator::new().with_type_version("dashboard", "1.0.0");
        let err = migrator
            .migrate_document(doc_with_version(Some("one")))
            .unwrap_err();
        assert!(matches!(err, MigrationError::InvalidVersion { .. }));
    }

    #[test]
    fn unconfigured_types_pass_through() {
        let migrator = VersionStampMigrator::new();
        let doc = doc_with_version(None);
        assert_eq!(migrator.migrate_document(doc.clone()).unwrap(), doc);
    }

    #[test]
    fn trailing_zero_components_compare_equal() {
        let migrator = VersionStampMigrator::new().with_type_version("dashboard", "7.9");
        assert!(migrator
            .migrate_document(doc_with_version(Some("7.9.0")))
            .is_ok());
    }
}
