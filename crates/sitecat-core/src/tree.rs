//! In-memory site hierarchy.
//!
//! Sites are stored in an arena keyed by id. Parents keep an ordered
//! list of child ids and every node stores its parent as an id, so the
//! structure never holds owning back-references. The nested [`Site`]
//! form is produced on demand for observers and persistence.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use crate::error::{SiteError, SiteResult};
use crate::models::polygon::Polygon;
use crate::models::site::{LeafAttributes, Site, SiteType, UpdateSite};
use crate::path::compute_path;
use crate::polygon::shape_violations;
use crate::validation::uniqueness::{
    MatchMode, NameCandidate, UniquenessRules, polygon_name_conflict,
};
use crate::validation::{
    CharacterSet, Field, Validator, Violation, ViolationKind, leaf_field_rules, name_rules,
};

/// Upper bound on ancestor walks; deeper chains indicate corruption.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum NodeKind {
    Parent {
        children: Vec<Uuid>,
    },
    Leaf {
        attributes: LeafAttributes,
        polygons: Vec<Polygon>,
    },
}

/// One site as stored in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteNode {
    id: Uuid,
    name_en: String,
    name_ar: String,
    path: String,
    parent_id: Option<Uuid>,
    kind: NodeKind,
}

impl SiteNode {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name_en(&self) -> &str {
        &self.name_en
    }

    pub fn name_ar(&self) -> &str {
        &self.name_ar
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    pub fn site_type(&self) -> SiteType {
        match self.kind {
            NodeKind::Parent { .. } => SiteType::Parent,
            NodeKind::Leaf { .. } => SiteType::Leaf,
        }
    }

    pub fn leaf_attributes(&self) -> Option<&LeafAttributes> {
        match &self.kind {
            NodeKind::Leaf { attributes, .. } => Some(attributes),
            NodeKind::Parent { .. } => None,
        }
    }

    pub fn polygons(&self) -> &[Polygon] {
        match &self.kind {
            NodeKind::Leaf { polygons, .. } => polygons,
            NodeKind::Parent { .. } => &[],
        }
    }

    pub fn children(&self) -> &[Uuid] {
        match &self.kind {
            NodeKind::Parent { children } => children,
            NodeKind::Leaf { .. } => &[],
        }
    }
}

/// Input for [`SiteTree::insert`]. The path is derived on insertion.
#[derive(Debug, Clone)]
pub struct NewSite {
    pub id: Uuid,
    pub name_en: String,
    pub name_ar: String,
    /// `Some` makes the new site a leaf.
    pub leaf: Option<LeafAttributes>,
    pub polygons: Vec<Polygon>,
}

impl NewSite {
    pub fn parent(name_en: impl Into<String>, name_ar: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name_en: name_en.into(),
            name_ar: name_ar.into(),
            leaf: None,
            polygons: Vec::new(),
        }
    }

    pub fn leaf(
        name_en: impl Into<String>,
        name_ar: impl Into<String>,
        attributes: LeafAttributes,
    ) -> Self {
        Self {
            leaf: Some(attributes),
            ..Self::parent(name_en, name_ar)
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_polygons(mut self, polygons: Vec<Polygon>) -> Self {
        self.polygons = polygons;
        self
    }
}

/// A forest of sites with an id index.
///
/// Cloning is the copy-on-write step: callers mutate a clone and only
/// publish it once every operation on it succeeded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteTree {
    nodes: HashMap<Uuid, SiteNode>,
    roots: Vec<Uuid>,
}

impl SiteTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: Uuid) -> Option<&SiteNode> {
        self.nodes.get(&id)
    }

    /// Root ids in insertion order.
    pub fn roots(&self) -> &[Uuid] {
        &self.roots
    }

    /// Every node, depth-first in sibling order.
    pub fn nodes(&self) -> impl Iterator<Item = &SiteNode> {
        let mut stack: Vec<Uuid> = self.roots.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let node = self.nodes.get(&stack.pop()?)?;
            stack.extend(node.children().iter().rev().copied());
            Some(node)
        })
    }

    /// Materialize the subtree rooted at `id`.
    pub fn find_by_id(&self, id: Uuid) -> Option<Site> {
        self.nodes.get(&id).map(|node| self.materialize(node))
    }

    /// The nested form of the whole forest.
    pub fn snapshot(&self) -> Vec<Site> {
        self.roots
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|node| self.materialize(node))
            .collect()
    }

    fn materialize(&self, node: &SiteNode) -> Site {
        let mut site = Site {
            id: node.id,
            name_en: node.name_en.clone(),
            name_ar: node.name_ar.clone(),
            path: node.path.clone(),
            site_type: node.site_type(),
            parent_id: node.parent_id,
            children: None,
            price_per_hour: None,
            integration_code: None,
            number_of_slots: None,
            polygons: None,
        };
        match &node.kind {
            NodeKind::Parent { children } => {
                site.children = Some(
                    children
                        .iter()
                        .filter_map(|id| self.nodes.get(id))
                        .map(|child| self.materialize(child))
                        .collect(),
                );
            }
            NodeKind::Leaf {
                attributes,
                polygons,
            } => {
                site.price_per_hour = Some(attributes.price_per_hour);
                site.integration_code = Some(attributes.integration_code.clone());
                site.number_of_slots = Some(attributes.number_of_slots);
                site.polygons = Some(polygons.clone());
            }
        }
        site
    }

    /// Rebuild a tree from its nested form.
    ///
    /// Paths are re-derived from names, so a stale stored path is
    /// corrected rather than rejected. Structural problems (duplicate
    /// ids, leaves at the root or with children, mismatched `parentId`,
    /// leaf fields on parents, malformed polygons) are rejected, and so
    /// is any site failing its field rules or sharing a name, code or
    /// polygon name with another.
    pub fn from_snapshot(sites: Vec<Site>) -> SiteResult<Self> {
        let mut tree = SiteTree::new();
        let mut v = Validator::new();
        for site in sites {
            tree.roots.push(site.id);
            tree.absorb(site, None, &mut v);
        }
        v.into_result()?;
        tree.content_violations().into_result()?;
        let roots = tree.roots.clone();
        tree.refresh_paths(&roots);
        Ok(tree)
    }

    /// Field and uniqueness rules over every site, compared exactly.
    fn content_violations(&self) -> Validator {
        let mut v = Validator::new();
        for node in self.nodes() {
            v.text(
                Field::NameEn,
                Some(node.name_en()),
                &name_rules(CharacterSet::English),
            )
            .text(
                Field::NameAr,
                Some(node.name_ar()),
                &name_rules(CharacterSet::Arabic),
            );
            if let Some(leaf) = node.leaf_attributes() {
                leaf_field_rules(
                    &mut v,
                    Some(&leaf.price_per_hour),
                    Some(leaf.integration_code.as_str()),
                    Some(leaf.number_of_slots),
                    true,
                );
            }

            let candidate = NameCandidate {
                name_en: Some(node.name_en.clone()),
                name_ar: Some(node.name_ar.clone()),
                integration_code: node.leaf_attributes().map(|l| l.integration_code.clone()),
            };
            let rules = UniquenessRules::new(self, MatchMode::Exact).excluding(node.id);
            v.extend(rules.check(&candidate).into_iter().map(Violation::from));

            for polygon in node.polygons() {
                v.text(
                    Field::PolygonName,
                    Some(polygon.name.as_str()),
                    &name_rules(CharacterSet::Mixed),
                );
                v.extend(
                    polygon_name_conflict(
                        node.polygons(),
                        &polygon.name,
                        Some(polygon.id),
                        MatchMode::Exact,
                    )
                    .map(Violation::from),
                );
            }
        }
        v
    }

    fn absorb(&mut self, site: Site, parent: Option<Uuid>, v: &mut Validator) {
        let id = site.id;
        if self.nodes.contains_key(&id) {
            v.push(Violation::new(Field::Id, ViolationKind::DuplicateId));
            return;
        }
        if site.parent_id != parent {
            v.push(Violation::new(
                Field::ParentId,
                ViolationKind::Mismatch {
                    expected: parent.map_or_else(|| "none".to_string(), |p| p.to_string()),
                },
            ));
        }

        let (kind, children) = match site.site_type {
            SiteType::Parent => {
                if site.price_per_hour.is_some()
                    || site.integration_code.is_some()
                    || site.number_of_slots.is_some()
                    || site.polygons.as_ref().is_some_and(|p| !p.is_empty())
                {
                    v.push(Violation::new(Field::Type, ViolationKind::LeafOnlyField));
                }
                let children = site.children.unwrap_or_default();
                let ids = children.iter().map(|c| c.id).collect();
                (NodeKind::Parent { children: ids }, children)
            }
            SiteType::Leaf => {
                if parent.is_none() {
                    v.push(Violation::new(Field::Type, ViolationKind::LeafRequiresParent));
                }
                if site.children.as_ref().is_some_and(|c| !c.is_empty()) {
                    v.push(Violation::new(Field::Children, ViolationKind::LeafHasChildren));
                }
                let (Some(price_per_hour), Some(integration_code), Some(number_of_slots)) = (
                    site.price_per_hour,
                    site.integration_code,
                    site.number_of_slots,
                ) else {
                    v.push(Violation::new(Field::Type, ViolationKind::Required));
                    return;
                };
                let polygons = site.polygons.unwrap_or_default();
                for polygon in &polygons {
                    if polygon.site_id != id {
                        v.push(Violation::new(
                            Field::Polygons,
                            ViolationKind::Mismatch {
                                expected: id.to_string(),
                            },
                        ));
                    }
                    v.extend(shape_violations(&polygon.coordinates));
                }
                let kind = NodeKind::Leaf {
                    attributes: LeafAttributes {
                        price_per_hour,
                        integration_code,
                        number_of_slots,
                    },
                    polygons,
                };
                (kind, Vec::new())
            }
        };

        self.nodes.insert(
            id,
            SiteNode {
                id,
                name_en: site.name_en,
                name_ar: site.name_ar,
                path: site.path,
                parent_id: parent,
                kind,
            },
        );
        for child in children {
            self.absorb(child, Some(id), v);
        }
    }

    /// Append a new site under `parent_id`, or as a root when `None`.
    ///
    /// The parent must exist and be a parent-type site; leaves need a
    /// parent.
    pub fn insert(&mut self, parent_id: Option<Uuid>, new: NewSite) -> SiteResult<Site> {
        if self.nodes.contains_key(&new.id) {
            return Err(SiteError::validation(Violation::new(
                Field::Id,
                ViolationKind::DuplicateId,
            )));
        }

        let parent_path = match parent_id {
            Some(pid) => {
                let parent = self.parent_node(pid)?;
                Some(parent.path.clone())
            }
            None => None,
        };

        let kind = match new.leaf {
            Some(attributes) => {
                if parent_id.is_none() {
                    return Err(SiteError::validation(Violation::new(
                        Field::Type,
                        ViolationKind::LeafRequiresParent,
                    )));
                }
                let polygons = new
                    .polygons
                    .into_iter()
                    .map(|polygon| Polygon {
                        site_id: new.id,
                        ..polygon
                    })
                    .collect();
                NodeKind::Leaf {
                    attributes,
                    polygons,
                }
            }
            None => {
                if !new.polygons.is_empty() {
                    return Err(SiteError::validation(Violation::new(
                        Field::Polygons,
                        ViolationKind::NotALeaf,
                    )));
                }
                NodeKind::Parent {
                    children: Vec::new(),
                }
            }
        };

        let path = compute_path(parent_path.as_deref(), &new.name_en);
        debug!(id = %new.id, %path, "Inserting site");

        self.nodes.insert(
            new.id,
            SiteNode {
                id: new.id,
                name_en: new.name_en,
                name_ar: new.name_ar,
                path,
                parent_id,
                kind,
            },
        );
        self.link(new.id, parent_id);

        self.find_by_id(new.id)
            .ok_or_else(|| SiteError::not_found("site", new.id))
    }

    /// Merge `patch` into the site `id`.
    ///
    /// Handles renames, moves (rejecting cycles), and type switches:
    /// leaf → parent drops leaf fields and polygons, parent → leaf needs
    /// a parent, no children and all three leaf fields. Paths are
    /// recomputed for the site and every descendant.
    pub fn update(&mut self, id: Uuid, patch: &UpdateSite) -> SiteResult<Site> {
        let node = self
            .nodes
            .get(&id)
            .ok_or_else(|| SiteError::not_found("site", id))?;

        let old_parent = node.parent_id;
        let target_parent = patch.parent_id.unwrap_or(old_parent);
        let was_leaf = node.site_type() == SiteType::Leaf;
        let to_leaf = patch.is_leaf.unwrap_or(was_leaf);

        let mut v = Validator::new();

        if target_parent != old_parent {
            if let Some(pid) = target_parent {
                let parent = self.parent_node(pid)?;
                if parent.id == id || self.is_ancestor(id, pid) {
                    v.push(Violation::new(Field::ParentId, ViolationKind::Cycle));
                }
            }
        }

        let kind = if to_leaf {
            if target_parent.is_none() {
                v.push(Violation::new(Field::Type, ViolationKind::LeafRequiresParent));
            }
            match &node.kind {
                NodeKind::Leaf {
                    attributes,
                    polygons,
                } => Some(NodeKind::Leaf {
                    attributes: LeafAttributes {
                        price_per_hour: patch.price_per_hour.unwrap_or(attributes.price_per_hour),
                        integration_code: patch
                            .integration_code
                            .clone()
                            .unwrap_or_else(|| attributes.integration_code.clone()),
                        number_of_slots: patch.number_of_slots.unwrap_or(attributes.number_of_slots),
                    },
                    polygons: polygons.clone(),
                }),
                NodeKind::Parent { children } => {
                    if !children.is_empty() {
                        v.push(Violation::new(Field::Children, ViolationKind::LeafHasChildren));
                    }
                    for (present, field) in [
                        (patch.price_per_hour.is_some(), Field::PricePerHour),
                        (patch.integration_code.is_some(), Field::IntegrationCode),
                        (patch.number_of_slots.is_some(), Field::NumberOfSlots),
                    ] {
                        if !present {
                            v.push(Violation::new(field, ViolationKind::Required));
                        }
                    }
                    match (
                        patch.price_per_hour,
                        patch.integration_code.clone(),
                        patch.number_of_slots,
                    ) {
                        (Some(price_per_hour), Some(integration_code), Some(number_of_slots)) => {
                            Some(NodeKind::Leaf {
                                attributes: LeafAttributes {
                                    price_per_hour,
                                    integration_code,
                                    number_of_slots,
                                },
                                polygons: Vec::new(),
                            })
                        }
                        _ => None,
                    }
                }
            }
        } else {
            if patch.touches_leaf_fields() {
                v.push(Violation::new(Field::Type, ViolationKind::LeafOnlyField));
            }
            match &node.kind {
                NodeKind::Parent { .. } => None,
                NodeKind::Leaf { .. } => {
                    debug!(%id, "Site switched from leaf to parent, clearing leaf fields");
                    Some(NodeKind::Parent {
                        children: Vec::new(),
                    })
                }
            }
        };

        v.into_result()?;

        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| SiteError::not_found("site", id))?;
        if let Some(name) = &patch.name_en {
            node.name_en = name.clone();
        }
        if let Some(name) = &patch.name_ar {
            node.name_ar = name.clone();
        }
        if let Some(kind) = kind {
            node.kind = kind;
        }
        node.parent_id = target_parent;

        if target_parent != old_parent {
            self.unlink(id, old_parent);
            self.link(id, target_parent);
        }
        self.refresh_paths(&[id]);

        self.find_by_id(id)
            .ok_or_else(|| SiteError::not_found("site", id))
    }

    /// Append a polygon to a leaf site, taking ownership of its `site_id`.
    pub fn attach_polygon(&mut self, site_id: Uuid, polygon: Polygon) -> SiteResult<Polygon> {
        let node = self
            .nodes
            .get_mut(&site_id)
            .ok_or_else(|| SiteError::not_found("site", site_id))?;
        match &mut node.kind {
            NodeKind::Leaf { polygons, .. } => {
                let polygon = Polygon {
                    site_id,
                    ..polygon
                };
                polygons.push(polygon.clone());
                Ok(polygon)
            }
            NodeKind::Parent { .. } => Err(SiteError::validation(Violation::new(
                Field::Type,
                ViolationKind::NotALeaf,
            ))),
        }
    }

    /// Whether `ancestor` lies on the parent chain of `id`.
    pub fn is_ancestor(&self, ancestor: Uuid, id: Uuid) -> bool {
        let mut current = self.nodes.get(&id).and_then(|n| n.parent_id);
        let mut seen = HashSet::new();
        while let Some(pid) = current {
            if pid == ancestor {
                return true;
            }
            if !seen.insert(pid) || seen.len() > MAX_DEPTH {
                return false;
            }
            current = self.nodes.get(&pid).and_then(|n| n.parent_id);
        }
        false
    }

    /// The parent-type site `pid`. A leaf cannot hold children, so it
    /// resolves to `NotFound` like a missing id.
    fn parent_node(&self, pid: Uuid) -> SiteResult<&SiteNode> {
        self.nodes
            .get(&pid)
            .filter(|node| node.site_type() == SiteType::Parent)
            .ok_or_else(|| SiteError::not_found("parent site", pid))
    }

    fn link(&mut self, id: Uuid, parent_id: Option<Uuid>) {
        match parent_id.and_then(|pid| self.nodes.get_mut(&pid)) {
            Some(SiteNode {
                kind: NodeKind::Parent { children },
                ..
            }) => children.push(id),
            _ => self.roots.push(id),
        }
    }

    fn unlink(&mut self, id: Uuid, parent_id: Option<Uuid>) {
        match parent_id.and_then(|pid| self.nodes.get_mut(&pid)) {
            Some(SiteNode {
                kind: NodeKind::Parent { children },
                ..
            }) => children.retain(|c| *c != id),
            _ => self.roots.retain(|r| *r != id),
        }
    }

    /// Re-derive the paths of `start` and all of their descendants.
    fn refresh_paths(&mut self, start: &[Uuid]) {
        let mut queue: Vec<Uuid> = start.to_vec();
        while let Some(id) = queue.pop() {
            let parent_path = self
                .nodes
                .get(&id)
                .and_then(|n| n.parent_id)
                .and_then(|pid| self.nodes.get(&pid))
                .map(|p| p.path.clone());
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            node.path = compute_path(parent_path.as_deref(), &node.name_en);
            queue.extend(node.children().iter().copied());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::polygon::Coordinate;
    use rust_decimal::Decimal;

    fn attrs(code: &str) -> LeafAttributes {
        LeafAttributes {
            price_per_hour: Decimal::new(550, 2),
            integration_code: code.into(),
            number_of_slots: 25,
        }
    }

    fn square(name: &str) -> Polygon {
        Polygon {
            id: Uuid::new_v4(),
            name: name.into(),
            site_id: Uuid::nil(),
            coordinates: vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(0.0, 1.0),
                Coordinate::new(1.0, 1.0),
                Coordinate::new(1.0, 0.0),
            ],
        }
    }

    fn sample() -> (SiteTree, Uuid, Uuid, Uuid) {
        let mut tree = SiteTree::new();
        let root = tree
            .insert(None, NewSite::parent("Main Parking", "موقف رئيسي"))
            .unwrap();
        let zone = tree
            .insert(Some(root.id), NewSite::parent("Zone A", "المنطقة أ"))
            .unwrap();
        let leaf = tree
            .insert(
                Some(zone.id),
                NewSite::leaf("A-01", "أ-01", attrs("MAIN_A01"))
                    .with_polygons(vec![square("A-01 Boundary")]),
            )
            .unwrap();
        (tree, root.id, zone.id, leaf.id)
    }

    #[test]
    fn insert_derives_paths() {
        let (tree, root, zone, leaf) = sample();
        assert_eq!(tree.node(root).unwrap().path(), "/main-parking");
        assert_eq!(tree.node(zone).unwrap().path(), "/main-parking/zone-a");
        assert_eq!(tree.node(leaf).unwrap().path(), "/main-parking/zone-a/a-01");
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn insert_assigns_polygon_owner() {
        let (tree, _, _, leaf) = sample();
        assert!(tree.node(leaf).unwrap().polygons().iter().all(|p| p.site_id == leaf));
    }

    #[test]
    fn insert_under_missing_or_leaf_parent_is_rejected() {
        let (mut tree, _, _, leaf) = sample();
        let err = tree
            .insert(Some(Uuid::new_v4()), NewSite::parent("Ghost", "شبح"))
            .unwrap_err();
        assert!(matches!(err, SiteError::NotFound { .. }));

        let err = tree
            .insert(Some(leaf), NewSite::parent("Under Leaf", "تحت"))
            .unwrap_err();
        assert!(matches!(err, SiteError::NotFound { .. }));
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn move_under_leaf_is_not_found() {
        let (mut tree, _, zone, leaf) = sample();
        let before = tree.clone();
        let err = tree
            .update(
                zone,
                &UpdateSite {
                    parent_id: Some(Some(leaf)),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SiteError::NotFound { .. }));
        assert_eq!(tree, before);
    }

    #[test]
    fn root_leaf_is_rejected() {
        let mut tree = SiteTree::new();
        let err = tree
            .insert(None, NewSite::leaf("Lonely", "وحيد", attrs("LONE")))
            .unwrap_err();
        assert!(matches!(err, SiteError::Validation { .. }));
        assert!(tree.is_empty());
    }

    #[test]
    fn find_by_id_materializes_subtree() {
        let (tree, root, zone, leaf) = sample();
        let site = tree.find_by_id(root).unwrap();
        let children = site.children.as_ref().unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].id, zone);
        let leaf_site = &children[0].children.as_ref().unwrap()[0];
        assert_eq!(leaf_site.id, leaf);
        assert!(leaf_site.children.is_none());
        assert_eq!(leaf_site.number_of_slots, Some(25));
        assert!(tree.find_by_id(Uuid::new_v4()).is_none());
    }

    #[test]
    fn nodes_iterates_depth_first() {
        let (mut tree, root, zone, leaf) = sample();
        let other = tree
            .insert(None, NewSite::parent("Overflow", "فائض"))
            .unwrap();
        let order: Vec<_> = tree.nodes().map(|n| n.id()).collect();
        assert_eq!(order, vec![root, zone, leaf, other.id]);
    }

    #[test]
    fn rename_cascades_to_descendants() {
        let (mut tree, root, zone, leaf) = sample();
        tree.update(
            root,
            &UpdateSite {
                name_en: Some("Central Garage".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(tree.node(root).unwrap().path(), "/central-garage");
        assert_eq!(tree.node(zone).unwrap().path(), "/central-garage/zone-a");
        assert_eq!(
            tree.node(leaf).unwrap().path(),
            "/central-garage/zone-a/a-01"
        );
    }

    #[test]
    fn move_relinks_and_recomputes() {
        let (mut tree, root, zone, leaf) = sample();
        let other = tree
            .insert(None, NewSite::parent("Overflow", "فائض"))
            .unwrap();
        tree.update(
            zone,
            &UpdateSite {
                parent_id: Some(Some(other.id)),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(tree.node(root).unwrap().children().is_empty());
        assert_eq!(tree.node(other.id).unwrap().children(), &[zone]);
        assert_eq!(tree.node(leaf).unwrap().path(), "/overflow/zone-a/a-01");

        tree.update(
            zone,
            &UpdateSite {
                parent_id: Some(None),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(tree.roots().contains(&zone));
        assert_eq!(tree.node(zone).unwrap().path(), "/zone-a");
    }

    #[test]
    fn move_under_own_descendant_is_a_cycle() {
        let (mut tree, root, zone, _) = sample();
        let before = tree.clone();
        let err = tree
            .update(
                root,
                &UpdateSite {
                    parent_id: Some(Some(zone)),
                    ..Default::default()
                },
            )
            .unwrap_err();
        match err {
            SiteError::Validation { violations } => {
                assert_eq!(violations[0].kind, ViolationKind::Cycle)
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(tree, before);
    }

    #[test]
    fn update_missing_site_is_not_found() {
        let (mut tree, ..) = sample();
        let before = tree.clone();
        let err = tree
            .update(Uuid::new_v4(), &UpdateSite::default())
            .unwrap_err();
        assert!(matches!(err, SiteError::NotFound { .. }));
        assert_eq!(tree, before);
    }

    #[test]
    fn leaf_to_parent_clears_leaf_fields() {
        let (mut tree, _, _, leaf) = sample();
        let site = tree
            .update(
                leaf,
                &UpdateSite {
                    is_leaf: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(site.site_type, SiteType::Parent);
        assert!(site.price_per_hour.is_none());
        assert!(site.integration_code.is_none());
        assert!(site.number_of_slots.is_none());
        assert!(site.polygons.is_none());
        assert_eq!(site.children, Some(Vec::new()));
    }

    #[test]
    fn parent_to_leaf_needs_fields_and_no_children() {
        let (mut tree, _, zone, _) = sample();
        let err = tree
            .update(
                zone,
                &UpdateSite {
                    is_leaf: Some(true),
                    ..Default::default()
                },
            )
            .unwrap_err();
        let SiteError::Validation { violations } = err else {
            panic!("expected validation error");
        };
        assert!(violations.contains(&Violation::new(
            Field::Children,
            ViolationKind::LeafHasChildren
        )));
        assert!(violations.contains(&Violation::new(
            Field::PricePerHour,
            ViolationKind::Required
        )));
    }

    #[test]
    fn childless_parent_becomes_leaf() {
        let (mut tree, _, zone, _) = sample();
        let bay = tree
            .insert(Some(zone), NewSite::parent("Bay 7", "خليج 7"))
            .unwrap();
        let site = tree
            .update(
                bay.id,
                &UpdateSite {
                    is_leaf: Some(true),
                    price_per_hour: Some(Decimal::new(300, 2)),
                    integration_code: Some("BAY_07".into()),
                    number_of_slots: Some(12),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(site.is_leaf());
        assert_eq!(site.polygons, Some(Vec::new()));
        assert_eq!(site.integration_code.as_deref(), Some("BAY_07"));
    }

    #[test]
    fn leaf_fields_on_parent_update_are_rejected() {
        let (mut tree, root, ..) = sample();
        let err = tree
            .update(
                root,
                &UpdateSite {
                    number_of_slots: Some(5),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SiteError::Validation { .. }));
    }

    #[test]
    fn leaf_cannot_move_to_root() {
        let (mut tree, _, _, leaf) = sample();
        let err = tree
            .update(
                leaf,
                &UpdateSite {
                    parent_id: Some(None),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SiteError::Validation { .. }));
    }

    #[test]
    fn attach_polygon_requires_leaf() {
        let (mut tree, root, _, leaf) = sample();
        let polygon = tree.attach_polygon(leaf, square("Overflow Strip")).unwrap();
        assert_eq!(polygon.site_id, leaf);
        assert_eq!(tree.node(leaf).unwrap().polygons().len(), 2);

        assert!(tree.attach_polygon(root, square("Nope")).is_err());
        assert!(matches!(
            tree.attach_polygon(Uuid::new_v4(), square("Nope")),
            Err(SiteError::NotFound { .. })
        ));
    }

    #[test]
    fn snapshot_round_trips() {
        let (tree, ..) = sample();
        let rebuilt = SiteTree::from_snapshot(tree.snapshot()).unwrap();
        assert_eq!(rebuilt, tree);
    }

    #[test]
    fn from_snapshot_repairs_stale_paths() {
        let (tree, _, _, leaf) = sample();
        let mut sites = tree.snapshot();
        sites[0].path = "/stale".into();
        let rebuilt = SiteTree::from_snapshot(sites).unwrap();
        assert_eq!(rebuilt.node(leaf).unwrap().path(), "/main-parking/zone-a/a-01");
    }

    #[test]
    fn from_snapshot_rejects_structural_errors() {
        let (tree, ..) = sample();

        let mut duplicated = tree.snapshot();
        duplicated.push(duplicated[0].clone());
        assert!(SiteTree::from_snapshot(duplicated).is_err());

        let mut root_leaf = tree.snapshot();
        let zone = root_leaf[0].children.as_ref().unwrap()[0].clone();
        let mut leaf = zone.children.as_ref().unwrap()[0].clone();
        leaf.parent_id = None;
        root_leaf.push(leaf);
        assert!(SiteTree::from_snapshot(root_leaf).is_err());

        let mut bad_parent_ref = tree.snapshot();
        bad_parent_ref[0].children.as_mut().unwrap()[0].parent_id = Some(Uuid::new_v4());
        assert!(SiteTree::from_snapshot(bad_parent_ref).is_err());
    }

    fn snapshot_violations(sites: Vec<Site>) -> Vec<Violation> {
        match SiteTree::from_snapshot(sites) {
            Err(SiteError::Validation { violations }) => violations,
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn from_snapshot_rejects_duplicate_names() {
        let (tree, ..) = sample();
        let mut sites = tree.snapshot();
        let mut twin = sites[0].clone();
        twin.id = Uuid::new_v4();
        twin.name_ar = "موقف ثان".into();
        twin.children = Some(Vec::new());
        sites.push(twin);

        let violations = snapshot_violations(sites);
        assert!(violations.contains(&Violation::new(
            Field::NameEn,
            ViolationKind::NotUnique {
                value: "Main Parking".into()
            }
        )));
    }

    #[test]
    fn from_snapshot_rejects_shared_integration_code_and_polygon_names() {
        let (mut tree, _, zone, leaf) = sample();
        tree.insert(
            Some(zone),
            NewSite::leaf("A-02", "أ-02", attrs("MAIN_A01")).with_polygons(vec![square("Bay")]),
        )
        .unwrap();
        tree.attach_polygon(leaf, square("A-01 Boundary")).unwrap();

        let fields: Vec<_> = snapshot_violations(tree.snapshot())
            .into_iter()
            .map(|v| v.field)
            .collect();
        assert!(fields.contains(&Field::IntegrationCode));
        assert!(fields.contains(&Field::PolygonName));
    }

    #[test]
    fn from_snapshot_applies_field_rules() {
        let (tree, ..) = sample();
        let mut sites = tree.snapshot();
        sites[0].name_en = "MP".into();
        let leaf = &mut sites[0].children.as_mut().unwrap()[0]
            .children
            .as_mut()
            .unwrap()[0];
        leaf.number_of_slots = Some(0);

        let fields: Vec<_> = snapshot_violations(sites)
            .into_iter()
            .map(|v| v.field)
            .collect();
        assert!(fields.contains(&Field::NameEn));
        assert!(fields.contains(&Field::NumberOfSlots));
    }
}
