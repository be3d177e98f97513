//! Polygon (geofence) domain model.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single polygon vertex in decimal degrees.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Exact-pair identity used for duplicate detection. `-0.0` and
    /// `0.0` map to the same key.
    pub(crate) fn pair_key(&self) -> (u64, u64) {
        fn bits(value: f64) -> u64 {
            if value == 0.0 { 0.0f64.to_bits() } else { value.to_bits() }
        }
        (bits(self.latitude), bits(self.longitude))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

/// A named geofence attached to exactly one leaf site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Polygon {
    pub id: Uuid,
    pub name: String,
    pub site_id: Uuid,
    pub coordinates: Vec<Coordinate>,
}

/// Fields required to attach a polygon to an existing leaf site.
#[derive(Debug, Clone)]
pub struct CreatePolygon {
    pub name: String,
    pub coordinates: Vec<Coordinate>,
    pub site_id: Uuid,
}

/// Temporary marker for polygons staged before their site exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StagingKey(Uuid);

impl StagingKey {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StagingKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StagingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "staging:{}", self.0)
    }
}
