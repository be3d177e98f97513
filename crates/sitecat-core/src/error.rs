//! Error types for the site catalog.

use thiserror::Error;

use crate::validation::Violation;

#[derive(Debug, Error)]
pub enum SiteError {
    #[error("Validation failed: {}", format_violations(.violations))]
    Validation { violations: Vec<Violation> },

    #[error("Uniqueness conflict: {field} '{value}' is already in use")]
    UniquenessConflict { field: String, value: String },

    #[error("Invalid polygon shape: {}", format_violations(.violations))]
    Shape { violations: Vec<Violation> },

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SiteError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        SiteError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn validation(violation: Violation) -> Self {
        SiteError::Validation {
            violations: vec![violation],
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type SiteResult<T> = Result<T, SiteError>;
