//! Saved object type registry.
//!
//! # Responsibility
//! - Declare, per object type, its namespace behavior, visibility and target index.
//! - Answer classification queries for the namespace policy and repository.
//!
//! # Invariants
//! - Every registered type has exactly one `NamespaceType`.
//! - Type names are unique and non-empty.
//! - Unknown types classify as single-namespace (neither agnostic nor multi).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Namespace behavior of an object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamespaceType {
    /// Instances belong to exactly one namespace; isolation via the raw id.
    Single,
    /// Instances may be shared to several namespaces via a `namespaces` list.
    Multiple,
    /// Instances are visible from every namespace.
    Agnostic,
}

/// Declaration of one saved object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedObjectType {
    pub name: String,
    pub namespace_type: NamespaceType,
    /// Hidden types are only reachable when explicitly included.
    #[serde(default)]
    pub hidden: bool,
    /// Dedicated index for this type; falls back to the repository index.
    #[serde(default)]
    pub index_pattern: Option<String>,
}

impl SavedObjectType {
    pub fn new(name: impl Into<String>, namespace_type: NamespaceType) -> Self {
        Self {
            name: name.into(),
            namespace_type,
            hidden: false,
            index_pattern: None,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index_pattern = Some(index.into());
        self
    }
}

/// Type registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRegistryError {
    InvalidTypeName(String),
    DuplicateType(String),
}

impl Display for TypeRegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTypeName(name) => write!(f, "saved object type name is invalid: `{name}`"),
            Self::DuplicateType(name) => {
                write!(f, "saved object type already registered: `{name}`")
            }
        }
    }
}

impl Error for TypeRegistryError {}

/// In-process registry of saved object types.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, SavedObjectType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one type declaration.
    pub fn register(&mut self, declaration: SavedObjectType) -> Result<(), TypeRegistryError> {
        let name = declaration.name.trim();
        if name.is_empty() || name != declaration.name || name.contains(':') {
            return Err(TypeRegistryError::InvalidTypeName(declaration.name));
        }
        if self.types.contains_key(name) {
            return Err(TypeRegistryError::DuplicateType(declaration.name));
        }

        self.types.insert(declaration.name.clone(), declaration);
        Ok(())
    }

    /// Returns all registered types sorted by name.
    pub fn get_all_types(&self) -> Vec<&SavedObjectType> {
        self.types.values().collect()
    }

    /// Returns the declaration of a registered type.
    pub fn get_type(&self, type_name: &str) -> Option<&SavedObjectType> {
        self.types.get(type_name)
    }

    pub fn is_namespace_agnostic(&self, type_name: &str) -> bool {
        self.namespace_type(type_name) == Some(NamespaceType::Agnostic)
    }

    pub fn is_multi_namespace(&self, type_name: &str) -> bool {
        self.namespace_type(type_name) == Some(NamespaceType::Multiple)
    }

    pub fn is_single_namespace(&self, type_name: &str) -> bool {
        !self.is_namespace_agnostic(type_name) && !self.is_multi_namespace(type_name)
    }

    pub fn is_hidden(&self, type_name: &str) -> bool {
        self.get_type(type_name)
            .is_some_and(|declaration| declaration.hidden)
    }

    /// Returns the dedicated index of a type, if any.
    pub fn get_index(&self, type_name: &str) -> Option<&str> {
        self.get_type(type_name)
            .and_then(|declaration| declaration.index_pattern.as_deref())
    }

    fn namespace_type(&self, type_name: &str) -> Option<NamespaceType> {
        self.get_type(type_name)
            .map(|declaration| declaration.namespace_type)
    }
}
