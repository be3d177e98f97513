//! Geofence editing, shape rules and staging.
//!
//! A [`PolygonDraft`] is the editable vertex list behind a geofence.
//! Drafts created before their owning site exists are parked in a
//! [`StagingArea`] under a [`StagingKey`] and committed once the site
//! has an id.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::error::{SiteError, SiteResult};
use crate::models::polygon::{Coordinate, Polygon, StagingKey};
use crate::validation::uniqueness::{MatchMode, polygon_name_conflict};
use crate::validation::{
    CharacterSet, Field, Validator, Violation, ViolationKind, name_rules, rules,
};

/// Fewest vertices a geofence may have.
pub const MIN_VERTICES: usize = 3;

/// Shape violations of a vertex list: too few vertices, repeated
/// vertices, and vertices failing the latitude/longitude rules.
pub fn shape_violations(coordinates: &[Coordinate]) -> Vec<Violation> {
    let mut v = Validator::new();
    if coordinates.len() < MIN_VERTICES {
        v.push(Violation::new(
            Field::Coordinates,
            ViolationKind::TooFewVertices {
                min: MIN_VERTICES,
                actual: coordinates.len(),
            },
        ));
    }

    let mut seen: HashMap<(u64, u64), usize> = HashMap::with_capacity(coordinates.len());
    for (index, coordinate) in coordinates.iter().enumerate() {
        v.check(Field::Latitude(index), rules::latitude(coordinate.latitude))
            .check(Field::Longitude(index), rules::longitude(coordinate.longitude));
        if let Some(first) = seen.insert(coordinate.pair_key(), index) {
            v.push(Violation::new(
                Field::Coordinates,
                ViolationKind::DuplicateVertex {
                    first,
                    second: index,
                },
            ));
        }
    }

    v.finish().err().unwrap_or_default()
}

/// Validate a polygon's name and shape together.
///
/// Shape problems are reported as [`SiteError::Shape`]; a bad name with a
/// sound shape is a [`SiteError::Validation`].
pub fn validate_polygon(name: &str, coordinates: &[Coordinate]) -> SiteResult<()> {
    let shape = shape_violations(coordinates);
    let mut v = Validator::new();
    v.text(
        Field::PolygonName,
        Some(name),
        &name_rules(CharacterSet::Mixed),
    );
    if !shape.is_empty() {
        let mut violations = shape;
        violations.extend(v.finish().err().unwrap_or_default());
        return Err(SiteError::Shape { violations });
    }
    v.into_result()
}

/// An editable geofence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolygonDraft {
    pub name: String,
    coordinates: Vec<Coordinate>,
}

impl PolygonDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            coordinates: Vec::new(),
        }
    }

    pub fn with_coordinates(name: impl Into<String>, coordinates: Vec<Coordinate>) -> Self {
        Self {
            name: name.into(),
            coordinates,
        }
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    /// Append a vertex. Out-of-range or over-precise values and exact
    /// repeats of an existing vertex are refused.
    pub fn add_vertex(&mut self, latitude: f64, longitude: f64) -> SiteResult<usize> {
        let index = self.coordinates.len();
        let coordinate = Coordinate::new(latitude, longitude);
        self.check_vertex(index, coordinate, None)?;
        self.coordinates.push(coordinate);
        Ok(index)
    }

    /// Replace the vertex at `index`.
    pub fn set_vertex(&mut self, index: usize, latitude: f64, longitude: f64) -> SiteResult<()> {
        self.check_index(index)?;
        let coordinate = Coordinate::new(latitude, longitude);
        self.check_vertex(index, coordinate, Some(index))?;
        self.coordinates[index] = coordinate;
        Ok(())
    }

    /// Remove the vertex at `index`. Refused when the polygon would end
    /// up below [`MIN_VERTICES`].
    pub fn remove_vertex(&mut self, index: usize) -> SiteResult<Coordinate> {
        self.check_index(index)?;
        if self.coordinates.len() <= MIN_VERTICES {
            return Err(SiteError::Shape {
                violations: vec![Violation::new(
                    Field::Coordinates,
                    ViolationKind::TooFewVertices {
                        min: MIN_VERTICES,
                        actual: self.coordinates.len() - 1,
                    },
                )],
            });
        }
        Ok(self.coordinates.remove(index))
    }

    /// Every violation of the draft: name rules plus shape rules.
    pub fn validate(&self) -> Vec<Violation> {
        let mut v = Validator::new();
        v.text(
            Field::PolygonName,
            Some(self.name.as_str()),
            &name_rules(CharacterSet::Mixed),
        )
        .extend(shape_violations(&self.coordinates));
        v.finish().err().unwrap_or_default()
    }

    /// Freeze the draft into a polygon owned by `site_id`.
    pub fn build(&self, site_id: Uuid) -> SiteResult<Polygon> {
        validate_polygon(&self.name, &self.coordinates)?;
        Ok(Polygon {
            id: Uuid::new_v4(),
            name: self.name.clone(),
            site_id,
            coordinates: self.coordinates.clone(),
        })
    }

    fn check_index(&self, index: usize) -> SiteResult<()> {
        if index < self.coordinates.len() {
            Ok(())
        } else {
            Err(SiteError::Shape {
                violations: vec![Violation::new(
                    Field::Coordinates,
                    ViolationKind::VertexIndex {
                        index,
                        len: self.coordinates.len(),
                    },
                )],
            })
        }
    }

    fn check_vertex(
        &self,
        index: usize,
        coordinate: Coordinate,
        replacing: Option<usize>,
    ) -> SiteResult<()> {
        let mut v = Validator::new();
        v.check(Field::Latitude(index), rules::latitude(coordinate.latitude))
            .check(Field::Longitude(index), rules::longitude(coordinate.longitude));
        v.into_result()?;

        let key = coordinate.pair_key();
        if let Some(first) = self
            .coordinates
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != replacing)
            .find(|(_, c)| c.pair_key() == key)
            .map(|(i, _)| i)
        {
            return Err(SiteError::Shape {
                violations: vec![Violation::new(
                    Field::Coordinates,
                    ViolationKind::DuplicateVertex {
                        first,
                        second: index,
                    },
                )],
            });
        }
        Ok(())
    }
}

/// Polygons waiting for their site to be created.
///
/// Each batch is keyed by a temporary marker. Staged polygons carry a
/// nil `site_id` until [`StagingArea::commit`] assigns the real one.
#[derive(Debug, Clone, Default)]
pub struct StagingArea {
    batches: HashMap<StagingKey, Vec<Polygon>>,
    mode: MatchMode,
}

impl StagingArea {
    pub fn new(mode: MatchMode) -> Self {
        Self {
            batches: HashMap::new(),
            mode,
        }
    }

    /// Open a new, empty batch.
    pub fn open(&mut self) -> StagingKey {
        let key = StagingKey::new();
        self.batches.insert(key, Vec::new());
        key
    }

    /// Validate `draft` and add it to the batch `key`. Names must be
    /// distinct within the batch.
    pub fn stage(&mut self, key: StagingKey, draft: &PolygonDraft) -> SiteResult<Polygon> {
        let polygon = draft.build(Uuid::nil())?;
        let batch = self.batches.entry(key).or_default();
        if let Some(conflict) = polygon_name_conflict(batch.iter(), &polygon.name, None, self.mode)
        {
            return Err(conflict.into());
        }
        debug!(%key, name = %polygon.name, "Staged polygon");
        batch.push(polygon.clone());
        Ok(polygon)
    }

    /// Put back a batch saved earlier under `key`, replacing whatever is
    /// staged there. Every polygon is re-validated.
    pub fn restore(&mut self, key: StagingKey, polygons: Vec<Polygon>) -> SiteResult<usize> {
        let mut batch: Vec<Polygon> = Vec::with_capacity(polygons.len());
        for polygon in polygons {
            validate_polygon(&polygon.name, &polygon.coordinates)?;
            if let Some(conflict) =
                polygon_name_conflict(batch.iter(), &polygon.name, None, self.mode)
            {
                return Err(conflict.into());
            }
            batch.push(Polygon {
                site_id: Uuid::nil(),
                ..polygon
            });
        }
        let restored = batch.len();
        self.batches.insert(key, batch);
        debug!(%key, restored, "Restored staged polygons");
        Ok(restored)
    }

    /// Remove one staged polygon from its batch.
    pub fn unstage(&mut self, key: StagingKey, polygon_id: Uuid) -> SiteResult<Polygon> {
        let batch = self
            .batches
            .get_mut(&key)
            .ok_or_else(|| SiteError::not_found("staging batch", key))?;
        let index = batch
            .iter()
            .position(|p| p.id == polygon_id)
            .ok_or_else(|| SiteError::not_found("staged polygon", polygon_id))?;
        Ok(batch.remove(index))
    }

    pub fn staged(&self, key: StagingKey) -> &[Polygon] {
        self.batches.get(&key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn staged_count(&self, key: StagingKey) -> usize {
        self.staged(key).len()
    }

    /// Drop a batch entirely, returning how many polygons it held.
    pub fn discard(&mut self, key: StagingKey) -> usize {
        let dropped = self.batches.remove(&key).map_or(0, |b| b.len());
        if dropped > 0 {
            debug!(%key, dropped, "Discarded staged polygons");
        }
        dropped
    }

    /// The batch's polygons re-owned by `site_id`, without removing them.
    /// Call [`StagingArea::discard`] once the site is safely stored.
    pub fn commit(&self, key: StagingKey, site_id: Uuid) -> Vec<Polygon> {
        self.staged(key)
            .iter()
            .map(|polygon| Polygon {
                site_id,
                ..polygon.clone()
            })
            .collect()
    }
}
