//! Database-specific error types and conversions.

use sitecat_core::error::SiteError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query rejected: {0}")]
    Query(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

impl From<DbError> for SiteError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => SiteError::NotFound { entity, id },
            other => SiteError::Storage(other.to_string()),
        }
    }
}
