//! The editable form behind "add site".
//!
//! A [`SiteDraft`] is either in `Parent` or `Leaf` mode. Entering `Leaf`
//! needs a resolved parent; without one the draft stays a parent and the
//! toggle reports [`ToggleOutcome::Coerced`]. Leaving `Leaf` clears the
//! leaf-only fields and discards the draft's staged polygons.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::uniqueness::{Conflict, NameCandidate};
use super::{CharacterSet, Field, Validator, Violation, ViolationKind, leaf_field_rules, name_rules};
use crate::models::polygon::{Polygon, StagingKey};
use crate::models::site::CreateSite;
use crate::path::compute_path;
use crate::polygon::StagingArea;

/// The site a draft will be created under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub id: Uuid,
    pub path: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormMode {
    #[default]
    Parent,
    Leaf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Unchanged,
    EnteredLeaf,
    /// Left leaf mode; carries how many staged polygons were dropped.
    LeftLeaf { discarded: usize },
    /// A leaf was requested (or kept) without a parent and the draft was
    /// forced back to parent mode.
    Coerced { discarded: usize },
}

/// State of the deferred uniqueness check for a draft.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum UniquenessStatus {
    #[default]
    Pending,
    Clear,
    Conflicts(Vec<Conflict>),
}

impl From<Vec<Conflict>> for UniquenessStatus {
    fn from(conflicts: Vec<Conflict>) -> Self {
        if conflicts.is_empty() {
            UniquenessStatus::Clear
        } else {
            UniquenessStatus::Conflicts(conflicts)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Invalid(Vec<Violation>),
    MissingPolygon,
    PendingUniqueness,
    Conflicts(Vec<Conflict>),
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDraft {
    pub name_en: String,
    pub name_ar: String,
    pub price_per_hour: Option<Decimal>,
    pub integration_code: Option<String>,
    pub number_of_slots: Option<u32>,
    parent: Option<ParentRef>,
    mode: FormMode,
    staging_key: StagingKey,
}

impl SiteDraft {
    pub fn new(parent: Option<ParentRef>) -> Self {
        Self {
            name_en: String::new(),
            name_ar: String::new(),
            price_per_hour: None,
            integration_code: None,
            number_of_slots: None,
            parent,
            mode: FormMode::Parent,
            staging_key: StagingKey::new(),
        }
    }

    pub fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn is_leaf(&self) -> bool {
        self.mode == FormMode::Leaf
    }

    /// Marker under which this draft's polygons are staged.
    pub fn staging_key(&self) -> StagingKey {
        self.staging_key
    }

    /// Switch between parent and leaf mode.
    pub fn set_leaf(&mut self, leaf: bool, staging: &mut StagingArea) -> ToggleOutcome {
        match (self.mode, leaf) {
            (FormMode::Parent, true) if self.parent.is_none() => {
                ToggleOutcome::Coerced { discarded: 0 }
            }
            (FormMode::Parent, true) => {
                self.mode = FormMode::Leaf;
                ToggleOutcome::EnteredLeaf
            }
            (FormMode::Leaf, false) => ToggleOutcome::LeftLeaf {
                discarded: self.leave_leaf(staging),
            },
            _ => ToggleOutcome::Unchanged,
        }
    }

    /// Change the parent. Losing the parent while in leaf mode coerces
    /// the draft back to a parent.
    pub fn set_parent(
        &mut self,
        parent: Option<ParentRef>,
        staging: &mut StagingArea,
    ) -> ToggleOutcome {
        self.parent = parent;
        if self.parent.is_none() && self.mode == FormMode::Leaf {
            ToggleOutcome::Coerced {
                discarded: self.leave_leaf(staging),
            }
        } else {
            ToggleOutcome::Unchanged
        }
    }

    fn leave_leaf(&mut self, staging: &mut StagingArea) -> usize {
        self.mode = FormMode::Parent;
        self.price_per_hour = None;
        self.integration_code = None;
        self.number_of_slots = None;
        let discarded = staging.discard(self.staging_key);
        self.staging_key = StagingKey::new();
        discarded
    }

    /// The path the site would get if created now.
    pub fn preview_path(&self) -> String {
        compute_path(self.parent.as_ref().map(|p| p.path.as_str()), &self.name_en)
    }

    /// Field rules for the current mode. Leaf-only rules apply only in
    /// leaf mode.
    pub fn field_violations(&self) -> Vec<Violation> {
        let mut v = Validator::new();
        v.text(
            Field::NameEn,
            Some(self.name_en.as_str()),
            &name_rules(CharacterSet::English),
        )
        .text(
            Field::NameAr,
            Some(self.name_ar.as_str()),
            &name_rules(CharacterSet::Arabic),
        );
        if self.is_leaf() {
            if self.parent.is_none() {
                v.push(Violation::new(Field::Type, ViolationKind::LeafRequiresParent));
            }
            leaf_field_rules(
                &mut v,
                self.price_per_hour.as_ref(),
                self.integration_code.as_deref(),
                self.number_of_slots,
                true,
            );
        }
        v.finish().err().unwrap_or_default()
    }

    pub fn candidate(&self) -> NameCandidate {
        NameCandidate {
            name_en: Some(self.name_en.clone()),
            name_ar: Some(self.name_ar.clone()),
            integration_code: if self.is_leaf() {
                self.integration_code.clone()
            } else {
                None
            },
        }
    }

    /// Whether the draft may be submitted.
    ///
    /// Field rules come first, then the polygon requirement for leaves,
    /// then the uniqueness check, which must have resolved clean.
    pub fn readiness(&self, staged_polygons: usize, uniqueness: &UniquenessStatus) -> Readiness {
        let violations = self.field_violations();
        if !violations.is_empty() {
            return Readiness::Invalid(violations);
        }
        if self.is_leaf() && staged_polygons == 0 {
            return Readiness::MissingPolygon;
        }
        match uniqueness {
            UniquenessStatus::Pending => Readiness::PendingUniqueness,
            UniquenessStatus::Conflicts(conflicts) => Readiness::Conflicts(conflicts.clone()),
            UniquenessStatus::Clear => Readiness::Ready,
        }
    }

    pub fn to_create_site(&self) -> CreateSite {
        let leaf = self.is_leaf();
        CreateSite {
            name_en: self.name_en.clone(),
            name_ar: self.name_ar.clone(),
            parent_id: self.parent.as_ref().map(|p| p.id),
            is_leaf: leaf,
            price_per_hour: self.price_per_hour.filter(|_| leaf),
            integration_code: self.integration_code.clone().filter(|_| leaf),
            number_of_slots: self.number_of_slots.filter(|_| leaf),
            staging_key: leaf.then_some(self.staging_key),
        }
    }
}

/// An in-progress draft and the polygons staged for it, in the form
/// kept between sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDraft {
    pub draft: SiteDraft,
    pub polygons: Vec<Polygon>,
}
