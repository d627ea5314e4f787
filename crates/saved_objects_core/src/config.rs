//! Repository and logging configuration.
//!
//! # Invariants
//! - Every field has a default, so an empty JSON object is a valid config.

use crate::repo::error::{RepoError, RepoResult};
use crate::store::Refresh;
use serde::{Deserialize, Serialize};

pub const DEFAULT_INDEX: &str = "saved_objects";
pub const FIND_DEFAULT_PAGE: usize = 1;
pub const FIND_DEFAULT_PER_PAGE: usize = 20;

/// Settings of one `SavedObjectsRepository`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Index used for types without a dedicated index.
    pub index: String,
    /// Hidden types this repository may still operate on.
    pub included_hidden_types: Vec<String>,
    /// Refresh setting of writes that do not pass one.
    pub refresh: Refresh,
    pub find_default_per_page: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            index: DEFAULT_INDEX.to_string(),
            included_hidden_types: Vec::new(),
            refresh: Refresh::WaitFor,
            find_default_per_page: FIND_DEFAULT_PER_PAGE,
        }
    }
}

impl RepositoryConfig {
    /// Parses a JSON config document.
    ///
    /// # Errors
    /// - Returns `InvalidConfig` for malformed JSON, an empty index name, or a
    ///   zero page size.
    pub fn from_json_str(raw: &str) -> RepoResult<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| RepoError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> RepoResult<()> {
        if self.index.trim().is_empty() {
            return Err(RepoError::InvalidConfig(
                "`index` must be a non-empty string".to_string(),
            ));
        }
        if self.find_default_per_page == 0 {
            return Err(RepoError::InvalidConfig(
                "`find_default_per_page` must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Logging settings consumed by `init_logging`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Directory of rotating log files; stderr when absent.
    pub log_dir: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            log_dir: None,
        }
    }
}
