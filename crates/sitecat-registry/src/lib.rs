//! Sitecat Registry. The façade over the site catalog: loading and
//! seeding, validated mutations, staging of geofences, deferred
//! uniqueness checks and change broadcast.

pub mod config;
pub mod persistence;
pub mod seed;
pub mod service;
pub mod uniqueness;

pub use config::RegistryConfig;
pub use persistence::{LoadSource, SeedReason, SnapshotPersistence};
pub use service::SiteRegistry;
pub use uniqueness::{CheckOutcome, UniquenessChecker};
