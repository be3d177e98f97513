//! Sitecat Server: application entry point.

use sitecat_db::{DbConfig, DbManager, SurrealSnapshotStore};
use sitecat_registry::{RegistryConfig, SiteRegistry};
use tracing_subscriber::EnvFilter;

/// Registry defaults overlaid with `SITECAT_STORAGE_KEY`,
/// `SITECAT_DRAFT_KEY`, `SITECAT_UNIQUENESS_DEBOUNCE_MS` and
/// `SITECAT_CASE_INSENSITIVE`.
fn registry_config() -> RegistryConfig {
    let mut config = RegistryConfig::default();
    if let Ok(key) = std::env::var("SITECAT_STORAGE_KEY") {
        config.storage_key = key;
    }
    if let Ok(key) = std::env::var("SITECAT_DRAFT_KEY") {
        config.draft_key = key;
    }
    if let Some(ms) = std::env::var("SITECAT_UNIQUENESS_DEBOUNCE_MS")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.uniqueness_debounce_ms = ms;
    }
    if let Ok(flag) = std::env::var("SITECAT_CASE_INSENSITIVE") {
        config.case_insensitive_uniqueness = matches!(flag.as_str(), "1" | "true" | "yes");
    }
    config
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sitecat=info".parse()?))
        .json()
        .init();

    tracing::info!("Starting sitecat server...");

    let db = DbManager::connect(&DbConfig::from_env()).await?;
    sitecat_db::run_migrations(db.client()).await?;

    let config = registry_config();
    let mut registry =
        SiteRegistry::open(SurrealSnapshotStore::new(db.client().clone()), config).await?;

    let leaves = registry.tree().nodes().filter(|n| n.leaf_attributes().is_some()).count();
    tracing::info!(
        sites = registry.tree().len(),
        roots = registry.tree().roots().len(),
        leaves,
        storage_key = %registry.config().storage_key,
        "Site catalog ready"
    );

    tokio::signal::ctrl_c().await?;

    if registry.has_unsaved_changes() {
        if registry.is_store_readable() {
            tracing::warn!("Flushing unsaved catalog changes before exit");
            registry.flush().await?;
        } else {
            tracing::error!("Catalog store was never read; in-memory changes are not written");
        }
    }

    tracing::info!("sitecat server stopped.");
    Ok(())
}
