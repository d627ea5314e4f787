//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `saved_objects_core` linkage.
//! - Run one create/get round-trip against a SQLite document store.
//!
//! Usage: `saved_objects_cli [DB_PATH]`; an in-memory store is used when no
//! path is given.

use log::info;
use saved_objects_core::{
    init_logging, BaseOptions, CreateOptions, LogConfig, NamespaceType, RepositoryConfig,
    SavedObjectType, SavedObjectsRepository, SqliteDocumentStore, TypeRegistry,
    VersionStampMigrator,
};
use serde_json::json;
use std::error::Error;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logging(&LogConfig::default())?;
    println!("saved_objects_core ping={}", saved_objects_core::ping());
    println!("saved_objects_core version={}", saved_objects_core::core_version());

    let store = match std::env::args().nth(1) {
        Some(path) => SqliteDocumentStore::open(path)?,
        None => SqliteDocumentStore::open_in_memory()?,
    };

    let mut registry = TypeRegistry::new();
    registry.register(SavedObjectType::new("dashboard", NamespaceType::Single))?;
    registry.register(SavedObjectType::new("config", NamespaceType::Agnostic))?;
    registry.register(SavedObjectType::new("space-obj", NamespaceType::Multiple))?;

    let repository = SavedObjectsRepository::create_repository(
        RepositoryConfig::default(),
        Arc::new(registry),
        Arc::new(store),
        Arc::new(VersionStampMigrator::new()),
    )?;

    let created = repository
        .create(
            "dashboard",
            json!({ "title": "CLI smoke" }),
            CreateOptions::default(),
        )
        .await?;
    let fetched = repository
        .get("dashboard", &created.id, BaseOptions::default())
        .await?;

    info!("event=cli_smoke module=cli status=ok");
    println!("{}", serde_json::to_string_pretty(&fetched)?);
    Ok(())
}
