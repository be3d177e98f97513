//! Site domain model.
//!
//! Sites form a forest: `parent` nodes group other sites, `leaf` nodes are
//! the billable units carrying capacity, pricing and geofences.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::polygon::{Polygon, StagingKey};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SiteType {
    Parent,
    Leaf,
}

impl fmt::Display for SiteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteType::Parent => f.write_str("parent"),
            SiteType::Leaf => f.write_str("leaf"),
        }
    }
}

/// A node of the site hierarchy, in its nested snapshot form.
///
/// This is both the shape handed to observers and the persisted JSON
/// shape: an array of roots, each optionally nesting `children` and
/// `polygons`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: Uuid,
    pub name_en: String,
    pub name_ar: String,
    /// Derived from the ancestors' slugs; never set directly.
    pub path: String,
    #[serde(rename = "type")]
    pub site_type: SiteType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    /// Present (possibly empty) only for `parent` sites.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Site>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_hour: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_of_slots: Option<u32>,
    /// Present only for `leaf` sites.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygons: Option<Vec<Polygon>>,
}

impl Site {
    pub fn is_leaf(&self) -> bool {
        self.site_type == SiteType::Leaf
    }

    /// Depth-first iterator over this site and all of its descendants.
    pub fn descendants(&self) -> impl Iterator<Item = &Site> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let site = stack.pop()?;
            if let Some(children) = &site.children {
                stack.extend(children.iter().rev());
            }
            Some(site)
        })
    }
}

/// Operational attributes that exist only on leaf sites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafAttributes {
    /// Hourly price with exactly two decimal places.
    pub price_per_hour: Decimal,
    pub integration_code: String,
    pub number_of_slots: u32,
}

/// Fields required to create a new site.
#[derive(Debug, Clone, Default)]
pub struct CreateSite {
    pub name_en: String,
    pub name_ar: String,
    pub parent_id: Option<Uuid>,
    pub is_leaf: bool,
    pub price_per_hour: Option<Decimal>,
    pub integration_code: Option<String>,
    pub number_of_slots: Option<u32>,
    /// Staged polygons to commit onto the new leaf.
    pub staging_key: Option<StagingKey>,
}

/// Fields that can be updated on an existing site.
#[derive(Debug, Clone, Default)]
pub struct UpdateSite {
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    /// `Some(Some(id))` = move under `id`, `Some(None)` = move to root,
    /// `None` = no change.
    pub parent_id: Option<Option<Uuid>>,
    pub is_leaf: Option<bool>,
    pub price_per_hour: Option<Decimal>,
    pub integration_code: Option<String>,
    pub number_of_slots: Option<u32>,
    /// Staged polygons to commit when the site becomes a leaf.
    pub staging_key: Option<StagingKey>,
}

impl UpdateSite {
    pub(crate) fn touches_leaf_fields(&self) -> bool {
        self.price_per_hour.is_some()
            || self.integration_code.is_some()
            || self.number_of_slots.is_some()
    }
}
