//! Sitecat Database: SurrealDB connection management and the snapshot
//! store behind the site registry.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - The [`SnapshotStore`](sitecat_core::SnapshotStore) implementation
//!   ([`SurrealSnapshotStore`])
//! - Error types ([`DbError`])

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use repository::SurrealSnapshotStore;
pub use schema::{run_migrations, schema_v1};
