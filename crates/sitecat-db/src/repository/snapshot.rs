//! SurrealDB implementation of [`SnapshotStore`].

use chrono::{DateTime, Utc};
use sitecat_core::error::SiteResult;
use sitecat_core::repository::SnapshotStore;
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::debug;

use crate::error::DbError;

#[derive(Debug, SurrealValue)]
struct PayloadRow {
    payload: String,
}

#[derive(Debug, SurrealValue)]
struct MetaRow {
    revision: i64,
    updated_at: DateTime<Utc>,
}

/// Bookkeeping stored next to a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMeta {
    /// Number of writes since the key was first stored.
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

/// Stores each snapshot as one `snapshot` record whose id is the
/// storage key.
#[derive(Clone)]
pub struct SurrealSnapshotStore<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealSnapshotStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    /// Revision and write time of the record under `key`.
    pub async fn meta(&self, key: &str) -> SiteResult<Option<SnapshotMeta>> {
        let mut result = self
            .db
            .query("SELECT revision, updated_at FROM type::record('snapshot', $key)")
            .bind(("key", key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MetaRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(|row| SnapshotMeta {
            revision: u64::try_from(row.revision).unwrap_or_default(),
            updated_at: row.updated_at,
        }))
    }
}

impl<C: Connection> SnapshotStore for SurrealSnapshotStore<C> {
    async fn read(&self, key: &str) -> SiteResult<Option<String>> {
        let mut result = self
            .db
            .query("SELECT payload FROM type::record('snapshot', $key)")
            .bind(("key", key.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PayloadRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.into_iter().next().map(|row| row.payload))
    }

    async fn write(&self, key: &str, blob: String) -> SiteResult<()> {
        let bytes = blob.len();
        self.db
            .query(
                "UPSERT type::record('snapshot', $key) SET \
                 payload = $payload, \
                 revision = (revision ?? 0) + 1, \
                 updated_at = time::now()",
            )
            .bind(("key", key.to_string()))
            .bind(("payload", blob))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        debug!(key, bytes, "Snapshot written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> SiteResult<()> {
        self.db
            .query("DELETE type::record('snapshot', $key)")
            .bind(("key", key.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        debug!(key, "Snapshot removed");
        Ok(())
    }
}
