//! Cross-entity rules evaluated against a snapshot of the tree.

use uuid::Uuid;

use super::{Field, Violation, ViolationKind};
use crate::error::SiteError;
use crate::models::polygon::Polygon;
use crate::models::site::{CreateSite, UpdateSite};
use crate::tree::{SiteNode, SiteTree};

/// How names and codes are compared for uniqueness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    #[default]
    Exact,
    CaseInsensitive,
}

impl MatchMode {
    pub fn same(&self, a: &str, b: &str) -> bool {
        match self {
            MatchMode::Exact => a == b,
            MatchMode::CaseInsensitive => a.to_lowercase() == b.to_lowercase(),
        }
    }
}

/// A value that collides with one already in use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub field: Field,
    pub value: String,
    /// Site (or polygon) that already holds the value.
    pub holder: Uuid,
}

impl From<Conflict> for SiteError {
    fn from(conflict: Conflict) -> Self {
        SiteError::UniquenessConflict {
            field: conflict.field.to_string(),
            value: conflict.value,
        }
    }
}

impl From<Conflict> for Violation {
    fn from(conflict: Conflict) -> Self {
        Violation::new(
            conflict.field,
            ViolationKind::NotUnique {
                value: conflict.value,
            },
        )
    }
}

/// The unique-valued fields of a site being created or edited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameCandidate {
    pub name_en: Option<String>,
    pub name_ar: Option<String>,
    pub integration_code: Option<String>,
}

impl From<&CreateSite> for NameCandidate {
    fn from(input: &CreateSite) -> Self {
        Self {
            name_en: Some(input.name_en.clone()),
            name_ar: Some(input.name_ar.clone()),
            integration_code: input.integration_code.clone(),
        }
    }
}

impl From<&UpdateSite> for NameCandidate {
    fn from(input: &UpdateSite) -> Self {
        Self {
            name_en: input.name_en.clone(),
            name_ar: input.name_ar.clone(),
            integration_code: input.integration_code.clone(),
        }
    }
}

/// Uniqueness rules over every site in a tree, optionally excluding the
/// site being edited.
#[derive(Debug, Clone, Copy)]
pub struct UniquenessRules<'a> {
    tree: &'a SiteTree,
    exclude: Option<Uuid>,
    mode: MatchMode,
}

impl<'a> UniquenessRules<'a> {
    pub fn new(tree: &'a SiteTree, mode: MatchMode) -> Self {
        Self {
            tree,
            exclude: None,
            mode,
        }
    }

    pub fn excluding(mut self, id: Uuid) -> Self {
        self.exclude = Some(id);
        self
    }

    /// A name collides when it equals any other site's English or
    /// Arabic name.
    pub fn name_conflict(&self, field: Field, name: &str) -> Option<Conflict> {
        if name.is_empty() {
            return None;
        }
        self.others()
            .find(|node| {
                self.mode.same(node.name_en(), name) || self.mode.same(node.name_ar(), name)
            })
            .map(|node| Conflict {
                field,
                value: name.to_string(),
                holder: node.id(),
            })
    }

    pub fn integration_code_conflict(&self, code: &str) -> Option<Conflict> {
        if code.is_empty() {
            return None;
        }
        self.others()
            .find(|node| {
                node.leaf_attributes()
                    .is_some_and(|leaf| self.mode.same(&leaf.integration_code, code))
            })
            .map(|node| Conflict {
                field: Field::IntegrationCode,
                value: code.to_string(),
                holder: node.id(),
            })
    }

    /// Every conflict for the candidate's present fields, in field order.
    pub fn check(&self, candidate: &NameCandidate) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        if let Some(name) = candidate.name_en.as_deref() {
            conflicts.extend(self.name_conflict(Field::NameEn, name));
        }
        if let Some(name) = candidate.name_ar.as_deref() {
            conflicts.extend(self.name_conflict(Field::NameAr, name));
        }
        if let Some(code) = candidate.integration_code.as_deref() {
            conflicts.extend(self.integration_code_conflict(code));
        }
        conflicts
    }

    fn others(&self) -> impl Iterator<Item = &'a SiteNode> {
        let exclude = self.exclude;
        self.tree
            .nodes()
            .filter(move |node| Some(node.id()) != exclude)
    }
}

/// Polygon names must be distinct within one scope: a staging batch, or
/// the polygons already attached to a site.
pub fn polygon_name_conflict<'p>(
    scope: impl IntoIterator<Item = &'p Polygon>,
    name: &str,
    exclude: Option<Uuid>,
    mode: MatchMode,
) -> Option<Conflict> {
    scope
        .into_iter()
        .filter(|polygon| Some(polygon.id) != exclude)
        .find(|polygon| mode.same(&polygon.name, name))
        .map(|polygon| Conflict {
            field: Field::PolygonName,
            value: name.to_string(),
            holder: polygon.id,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::site::LeafAttributes;
    use crate::tree::NewSite;
    use rust_decimal::Decimal;

    fn sample_tree() -> (SiteTree, Uuid, Uuid) {
        let mut tree = SiteTree::new();
        let root = tree
            .insert(None, NewSite::parent("Main Parking", "موقف رئيسي"))
            .unwrap();
        let leaf = tree
            .insert(
                Some(root.id),
                NewSite::leaf(
                    "A-01",
                    "أ-01",
                    LeafAttributes {
                        price_per_hour: Decimal::new(550, 2),
                        integration_code: "MAIN_A01".into(),
                        number_of_slots: 25,
                    },
                ),
            )
            .unwrap();
        (tree, root.id, leaf.id)
    }

    #[test]
    fn detects_name_collision_across_languages() {
        let (tree, root, _) = sample_tree();
        let rules = UniquenessRules::new(&tree, MatchMode::Exact);

        let conflict = rules.name_conflict(Field::NameEn, "Main Parking").unwrap();
        assert_eq!(conflict.holder, root);

        let conflict = rules.name_conflict(Field::NameAr, "Main Parking").unwrap();
        assert_eq!(conflict.field, Field::NameAr);

        assert!(rules.name_conflict(Field::NameEn, "Overflow Lot").is_none());
    }

    #[test]
    fn excluded_site_does_not_conflict_with_itself() {
        let (tree, root, _) = sample_tree();
        let rules = UniquenessRules::new(&tree, MatchMode::Exact).excluding(root);
        assert!(rules.name_conflict(Field::NameEn, "Main Parking").is_none());
    }

    #[test]
    fn case_sensitivity_follows_mode() {
        let (tree, _, _) = sample_tree();
        let exact = UniquenessRules::new(&tree, MatchMode::Exact);
        assert!(exact.name_conflict(Field::NameEn, "main parking").is_none());

        let folded = UniquenessRules::new(&tree, MatchMode::CaseInsensitive);
        assert!(folded.name_conflict(Field::NameEn, "main parking").is_some());
        assert!(folded.integration_code_conflict("main_a01").is_some());
    }

    #[test]
    fn integration_code_collision() {
        let (tree, _, leaf) = sample_tree();
        let rules = UniquenessRules::new(&tree, MatchMode::Exact);
        assert_eq!(rules.integration_code_conflict("MAIN_A01").unwrap().holder, leaf);
        assert!(rules.excluding(leaf).integration_code_conflict("MAIN_A01").is_none());
    }

    #[test]
    fn check_reports_every_conflicting_field() {
        let (tree, _, _) = sample_tree();
        let rules = UniquenessRules::new(&tree, MatchMode::Exact);
        let conflicts = rules.check(&NameCandidate {
            name_en: Some("A-01".into()),
            name_ar: Some("موقف رئيسي".into()),
            integration_code: Some("MAIN_A01".into()),
        });
        let fields: Vec<_> = conflicts.into_iter().map(|c| c.field).collect();
        assert_eq!(
            fields,
            vec![Field::NameEn, Field::NameAr, Field::IntegrationCode]
        );
    }

    #[test]
    fn polygon_names_are_scoped() {
        let site_id = Uuid::new_v4();
        let existing = vec![Polygon {
            id: Uuid::new_v4(),
            name: "North Gate".into(),
            site_id,
            coordinates: Vec::new(),
        }];
        assert!(polygon_name_conflict(&existing, "North Gate", None, MatchMode::Exact).is_some());
        assert!(polygon_name_conflict(&existing, "South Gate", None, MatchMode::Exact).is_none());
        assert!(
            polygon_name_conflict(&existing, "North Gate", Some(existing[0].id), MatchMode::Exact)
                .is_none()
        );
    }

    #[test]
    fn conflict_converts_to_uniqueness_error() {
        let err: SiteError = Conflict {
            field: Field::NameEn,
            value: "Main Parking".into(),
            holder: Uuid::nil(),
        }
        .into();
        assert!(matches!(
            err,
            SiteError::UniquenessConflict { ref field, .. } if field == "nameEn"
        ));
    }
}
