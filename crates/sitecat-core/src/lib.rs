//! Sitecat Core: the site hierarchy model, path derivation, field and
//! uniqueness rules, and geofence invariants.
//!
//! This crate provides:
//! - The wire model ([`Site`], [`Polygon`]) and request types
//! - The in-memory tree ([`SiteTree`]) that owns every structural invariant
//! - Validation ([`validation`]) and polygon editing ([`polygon`])
//! - The persistence port ([`SnapshotStore`])

pub mod error;
pub mod models;
pub mod path;
pub mod polygon;
pub mod repository;
pub mod tree;
pub mod validation;

pub use error::{SiteError, SiteResult};
pub use models::polygon::{Coordinate, CreatePolygon, Polygon, StagingKey};
pub use models::site::{CreateSite, LeafAttributes, Site, SiteType, UpdateSite};
pub use repository::{MemoryStore, SnapshotStore};
pub use tree::{NewSite, SiteNode, SiteTree};
