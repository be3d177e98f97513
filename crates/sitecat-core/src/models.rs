//! Domain models for the site catalog.
//!
//! These are the core types shared across all crates. The serialized
//! form of [`site::Site`] is also the persisted snapshot shape.

pub mod polygon;
pub mod site;
