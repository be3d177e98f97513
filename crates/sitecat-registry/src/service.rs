//! Site registry: the single writer over the catalog.

use std::sync::Arc;

use sitecat_core::error::{SiteError, SiteResult};
use sitecat_core::models::polygon::{CreatePolygon, Polygon, StagingKey};
use sitecat_core::models::site::{CreateSite, LeafAttributes, Site, SiteType, UpdateSite};
use sitecat_core::polygon::{PolygonDraft, StagingArea};
use sitecat_core::repository::SnapshotStore;
use sitecat_core::tree::{NewSite, SiteTree};
use sitecat_core::validation::draft::{
    ParentRef, Readiness, SavedDraft, SiteDraft, ToggleOutcome, UniquenessStatus,
};
use sitecat_core::validation::uniqueness::{NameCandidate, polygon_name_conflict};
use sitecat_core::validation::{Field, Violation, ViolationKind, validate_create, validate_update};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RegistryConfig;
use crate::persistence::{LoadSource, SnapshotPersistence};
use crate::seed;
use crate::uniqueness::UniquenessChecker;

/// Owns the catalog and publishes every committed change.
///
/// Mutations work on a clone of the current tree. Once every check on
/// the clone passed it is swapped in, persisted and broadcast. Storage
/// failures are logged and do not roll back the in-memory change;
/// [`SiteRegistry::flush`] retries.
///
/// If the store could not be read at startup, nothing is written to it
/// until [`SiteRegistry::reload`] succeeds, so the stored catalog is
/// never replaced by one that was never loaded.
///
/// Generic over the store so that the registry has no dependency on
/// the database crate.
pub struct SiteRegistry<S: SnapshotStore> {
    persistence: SnapshotPersistence<S>,
    config: RegistryConfig,
    tree: Arc<SiteTree>,
    staging: StagingArea,
    selected: Option<Uuid>,
    unsaved: bool,
    store_readable: bool,
    sites_tx: watch::Sender<Arc<SiteTree>>,
    selection_tx: watch::Sender<Option<Site>>,
    checker: UniquenessChecker,
}

impl<S: SnapshotStore> SiteRegistry<S> {
    /// Load the catalog from `store`, seeding it when nothing usable is
    /// stored.
    pub async fn open(store: S, config: RegistryConfig) -> SiteResult<Self> {
        let persistence = SnapshotPersistence::new(store, config.storage_key.clone());
        let loaded = persistence.load().await?;
        if let LoadSource::Seeded(reason) = loaded.source {
            info!(%reason, "Registry started from default catalog");
        }

        let tree = Arc::new(loaded.tree);
        let (sites_tx, sites_rx) = watch::channel(Arc::clone(&tree));
        let (selection_tx, _) = watch::channel(None);
        let checker =
            UniquenessChecker::new(sites_rx, config.uniqueness_debounce(), config.match_mode());

        Ok(Self {
            persistence,
            staging: StagingArea::new(config.match_mode()),
            config,
            tree,
            selected: None,
            unsaved: !loaded.persisted,
            store_readable: !loaded.source.is_unreadable(),
            sites_tx,
            selection_tx,
            checker,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        self.persistence.store()
    }

    /// The current committed tree.
    pub fn tree(&self) -> &SiteTree {
        &self.tree
    }

    pub fn sites(&self) -> Vec<Site> {
        self.tree.snapshot()
    }

    pub fn site_by_id(&self, id: Uuid) -> Option<Site> {
        self.tree.find_by_id(id)
    }

    /// Receives the tree after every committed change.
    pub fn subscribe_sites(&self) -> watch::Receiver<Arc<SiteTree>> {
        self.sites_tx.subscribe()
    }

    /// Receives the selected site, refreshed whenever it changes.
    pub fn subscribe_selection(&self) -> watch::Receiver<Option<Site>> {
        self.selection_tx.subscribe()
    }

    pub fn selected(&self) -> Option<Site> {
        self.selected.and_then(|id| self.tree.find_by_id(id))
    }

    /// Focus a site, or clear the focus with `None`. Not persisted.
    pub fn select_site(&mut self, id: Option<Uuid>) -> SiteResult<Option<Site>> {
        let site = match id {
            Some(id) => Some(
                self.tree
                    .find_by_id(id)
                    .ok_or_else(|| SiteError::not_found("site", id))?,
            ),
            None => None,
        };
        self.selected = id;
        self.publish_selection(site.clone());
        Ok(site)
    }

    /// A handle for debounced uniqueness checks against this registry's
    /// published tree.
    pub fn uniqueness_checker(&self) -> UniquenessChecker {
        self.checker.clone()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    /// False while the stored catalog has never been read successfully.
    pub fn is_store_readable(&self) -> bool {
        self.store_readable
    }

    // -----------------------------------------------------------------
    // Sites
    // -----------------------------------------------------------------

    /// Create a site under `input.parent_id`, or as a root.
    ///
    /// A leaf takes its polygons from the staging batch named by
    /// `input.staging_key` and must receive at least one.
    pub async fn create_site(&mut self, input: CreateSite) -> SiteResult<Site> {
        validate_create(&input)?;
        self.reject_conflicts(&NameCandidate::from(&input), None)?;

        let id = Uuid::new_v4();
        let leaf = match (
            input.is_leaf,
            input.price_per_hour,
            input.integration_code,
            input.number_of_slots,
        ) {
            (true, Some(price_per_hour), Some(integration_code), Some(number_of_slots)) => {
                Some(LeafAttributes {
                    price_per_hour,
                    integration_code,
                    number_of_slots,
                })
            }
            _ => None,
        };
        let polygons = match (&leaf, input.staging_key) {
            (Some(_), Some(key)) => self.staging.commit(key, id),
            _ => Vec::new(),
        };
        if leaf.is_some() && polygons.is_empty() {
            return Err(missing_polygon());
        }

        let new = NewSite {
            id,
            name_en: input.name_en,
            name_ar: input.name_ar,
            leaf,
            polygons,
        };
        let mut next = (*self.tree).clone();
        let site = next.insert(input.parent_id, new)?;

        if let Some(key) = input.staging_key {
            self.staging.discard(key);
        }
        info!(id = %site.id, path = %site.path, site_type = %site.site_type, "Site created");
        self.commit(next).await;
        Ok(site)
    }

    /// Merge `input` into the site `id`.
    ///
    /// Polygons staged under `input.staging_key` are attached when the
    /// site is (or becomes) a leaf. A parent turning into a leaf must
    /// receive at least one.
    pub async fn update_site(&mut self, id: Uuid, input: UpdateSite) -> SiteResult<Site> {
        let was_leaf = self
            .tree
            .node(id)
            .ok_or_else(|| SiteError::not_found("site", id))?
            .site_type()
            == SiteType::Leaf;

        validate_update(&input)?;
        self.reject_conflicts(&NameCandidate::from(&input), Some(id))?;

        let mut next = (*self.tree).clone();
        let updated = next.update(id, &input)?;

        if updated.is_leaf() {
            if let Some(key) = input.staging_key {
                for polygon in self.staging.commit(key, id) {
                    attach_unique(&mut next, &self.config, id, polygon)?;
                }
            }
            let attached = next.node(id).map_or(0, |n| n.polygons().len());
            if !was_leaf && attached == 0 {
                return Err(missing_polygon());
            }
        }

        if let Some(key) = input.staging_key {
            self.staging.discard(key);
        }
        let site = next
            .find_by_id(id)
            .ok_or_else(|| SiteError::not_found("site", id))?;
        info!(%id, path = %site.path, site_type = %site.site_type, "Site updated");
        self.commit(next).await;
        Ok(site)
    }

    /// Attach a new geofence to an existing leaf site. Names must be
    /// unique among that site's polygons.
    pub async fn create_polygon(&mut self, input: CreatePolygon) -> SiteResult<Polygon> {
        let polygon =
            PolygonDraft::with_coordinates(input.name, input.coordinates).build(input.site_id)?;

        let mut next = (*self.tree).clone();
        let polygon = attach_unique(&mut next, &self.config, input.site_id, polygon)?;

        info!(id = %polygon.id, site_id = %polygon.site_id, "Polygon attached");
        self.commit(next).await;
        Ok(polygon)
    }

    // -----------------------------------------------------------------
    // Drafts and staging
    // -----------------------------------------------------------------

    /// A blank draft under `parent`.
    pub fn new_draft(&self, parent: Option<Uuid>) -> SiteResult<SiteDraft> {
        Ok(SiteDraft::new(self.parent_ref(parent)?))
    }

    pub fn set_draft_parent(
        &mut self,
        draft: &mut SiteDraft,
        parent: Option<Uuid>,
    ) -> SiteResult<ToggleOutcome> {
        let parent = self.parent_ref(parent)?;
        Ok(draft.set_parent(parent, &mut self.staging))
    }

    pub fn set_draft_leaf(&mut self, draft: &mut SiteDraft, leaf: bool) -> ToggleOutcome {
        let outcome = draft.set_leaf(leaf, &mut self.staging);
        if let ToggleOutcome::Coerced { .. } = outcome {
            warn!("Leaf requested without a parent; draft kept as parent");
        }
        outcome
    }

    /// Open an empty staging batch, for polygons added while editing an
    /// existing site.
    pub fn open_staging(&mut self) -> StagingKey {
        self.staging.open()
    }

    pub fn stage_polygon(&mut self, key: StagingKey, draft: &PolygonDraft) -> SiteResult<Polygon> {
        self.staging.stage(key, draft)
    }

    pub fn unstage_polygon(&mut self, key: StagingKey, polygon_id: Uuid) -> SiteResult<Polygon> {
        self.staging.unstage(key, polygon_id)
    }

    pub fn staged_polygons(&self, key: StagingKey) -> &[Polygon] {
        self.staging.staged(key)
    }

    pub fn discard_staging(&mut self, key: StagingKey) -> usize {
        self.staging.discard(key)
    }

    pub fn draft_readiness(&self, draft: &SiteDraft, uniqueness: &UniquenessStatus) -> Readiness {
        draft.readiness(self.staging.staged_count(draft.staging_key()), uniqueness)
    }

    /// Create the site described by `draft` together with its staged
    /// polygons. Uniqueness is re-checked against the committed tree.
    ///
    /// On failure the draft and its staged polygons stay as they were, so
    /// the caller can correct it and submit again. On success the staged
    /// batch is consumed and the auto-saved draft is removed.
    pub async fn submit_draft(&mut self, draft: &SiteDraft) -> SiteResult<Site> {
        self.checker.cancel();
        let status = UniquenessStatus::from(self.checker.check_now(&draft.candidate(), None));
        match self.draft_readiness(draft, &status) {
            Readiness::Ready => {}
            Readiness::Invalid(violations) => return Err(SiteError::Validation { violations }),
            Readiness::MissingPolygon => return Err(missing_polygon()),
            Readiness::Conflicts(conflicts) => {
                return Err(conflicts
                    .into_iter()
                    .next()
                    .map(SiteError::from)
                    .unwrap_or_else(|| SiteError::Internal("empty conflict list".into())));
            }
            Readiness::PendingUniqueness => {
                return Err(SiteError::Internal("uniqueness check did not resolve".into()));
            }
        }
        let site = self.create_site(draft.to_create_site()).await?;
        if let Err(e) = self.clear_draft().await {
            error!(error = %e, "Failed to remove auto-saved draft");
        }
        Ok(site)
    }

    /// Drop a draft, everything staged for it, and its auto-saved copy.
    pub async fn discard_draft(&mut self, draft: SiteDraft) -> usize {
        self.checker.cancel();
        let discarded = self.staging.discard(draft.staging_key());
        if let Err(e) = self.clear_draft().await {
            error!(error = %e, "Failed to remove auto-saved draft");
        }
        discarded
    }

    /// Store `draft` and its staged polygons under the draft key,
    /// replacing any earlier copy.
    pub async fn save_draft(&self, draft: &SiteDraft) -> SiteResult<()> {
        let saved = SavedDraft {
            draft: draft.clone(),
            polygons: self.staging.staged(draft.staging_key()).to_vec(),
        };
        let blob = serde_json::to_string(&saved)
            .map_err(|e| SiteError::Internal(format!("draft serialization failed: {e}")))?;
        self.store().write(&self.config.draft_key, blob).await?;
        debug!(polygons = saved.polygons.len(), "Draft saved");
        Ok(())
    }

    /// Bring back the auto-saved draft, if any, with its staged polygons.
    ///
    /// The parent is looked up again: a renamed parent refreshes the
    /// path preview, and a parent that no longer accepts children is
    /// dropped, which coerces a leaf draft back to a parent. An
    /// unparsable copy is ignored.
    pub async fn restore_draft(&mut self) -> SiteResult<Option<SiteDraft>> {
        let Some(blob) = self.store().read(&self.config.draft_key).await? else {
            return Ok(None);
        };
        let SavedDraft {
            mut draft,
            polygons,
        } = match serde_json::from_str(&blob) {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "Saved draft is not valid JSON; ignoring it");
                return Ok(None);
            }
        };

        if let Err(e) = self.staging.restore(draft.staging_key(), polygons) {
            warn!(error = %e, "Saved draft polygons are invalid; dropping them");
        }

        let parent = match draft.parent().map(|p| p.id) {
            Some(id) => self.parent_ref(Some(id)).unwrap_or_else(|e| {
                warn!(%id, error = %e, "Saved draft's parent is gone");
                None
            }),
            None => None,
        };
        if let ToggleOutcome::Coerced { discarded } = draft.set_parent(parent, &mut self.staging) {
            warn!(discarded, "Restored draft lost its parent; kept as parent");
        }

        info!(
            staged = self.staging.staged_count(draft.staging_key()),
            "Draft restored"
        );
        Ok(Some(draft))
    }

    /// Remove the auto-saved draft.
    pub async fn clear_draft(&self) -> SiteResult<()> {
        self.store().remove(&self.config.draft_key).await
    }

    // -----------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------

    /// Replace the catalog with the default tree.
    pub async fn reset_to_defaults(&mut self) -> SiteResult<()> {
        let next = seed::default_tree()?;
        info!(sites = next.len(), "Catalog reset to defaults");
        self.commit(next).await;
        Ok(())
    }

    /// Remove the stored catalog and empty the tree.
    pub async fn clear_all(&mut self) -> SiteResult<()> {
        self.tree = Arc::new(SiteTree::new());
        match self.persistence.clear().await {
            Ok(()) => {
                self.unsaved = false;
                self.store_readable = true;
            }
            Err(e) => {
                error!(error = %e, "Failed to remove stored catalog");
                self.unsaved = true;
            }
        }
        info!("Catalog cleared");
        self.publish();
        Ok(())
    }

    /// Write the current tree if a previous save failed. Refused while
    /// the store has never been read.
    pub async fn flush(&mut self) -> SiteResult<()> {
        if !self.unsaved {
            return Ok(());
        }
        if !self.store_readable {
            return Err(unread_store(self.persistence.key()));
        }
        self.persistence.save(&self.tree).await?;
        self.unsaved = false;
        debug!("Pending catalog changes flushed");
        Ok(())
    }

    /// Load the stored catalog again and make it current.
    ///
    /// Used after the store was unreadable at startup. Changes made in
    /// memory since then are replaced. While the store is still
    /// unreadable this fails and nothing changes.
    pub async fn reload(&mut self) -> SiteResult<LoadSource> {
        let loaded = self.persistence.load().await?;
        if loaded.source.is_unreadable() {
            return Err(unread_store(self.persistence.key()));
        }
        if self.unsaved {
            warn!("Reload replaces unsaved in-memory changes");
        }
        self.tree = Arc::new(loaded.tree);
        self.store_readable = true;
        self.unsaved = !loaded.persisted;
        info!(source = ?loaded.source, sites = self.tree.len(), "Catalog reloaded");
        self.publish();
        Ok(loaded.source)
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn parent_ref(&self, parent: Option<Uuid>) -> SiteResult<Option<ParentRef>> {
        let Some(id) = parent else {
            return Ok(None);
        };
        let node = self
            .tree
            .node(id)
            .filter(|node| node.site_type() == SiteType::Parent)
            .ok_or_else(|| SiteError::not_found("parent site", id))?;
        Ok(Some(ParentRef {
            id,
            path: node.path().to_string(),
        }))
    }

    fn reject_conflicts(&self, candidate: &NameCandidate, exclude: Option<Uuid>) -> SiteResult<()> {
        match self.checker.check_now(candidate, exclude).into_iter().next() {
            Some(conflict) => Err(conflict.into()),
            None => Ok(()),
        }
    }

    /// Swap in `next`, persist it and broadcast it.
    async fn commit(&mut self, next: SiteTree) {
        self.tree = Arc::new(next);
        if !self.store_readable {
            warn!("Catalog store was never read; change kept in memory");
            self.unsaved = true;
            self.publish();
            return;
        }
        match self.persistence.save(&self.tree).await {
            Ok(()) => self.unsaved = false,
            Err(e) => {
                error!(error = %e, "Failed to persist catalog; changes kept in memory");
                self.unsaved = true;
            }
        }
        self.publish();
    }

    fn publish(&mut self) {
        self.sites_tx.send_replace(Arc::clone(&self.tree));

        let Some(id) = self.selected else {
            return;
        };
        let fresh = self.tree.find_by_id(id);
        if fresh.is_none() {
            self.selected = None;
        }
        self.publish_selection(fresh);
    }

    fn publish_selection(&self, site: Option<Site>) {
        self.selection_tx.send_if_modified(|current| {
            if *current == site {
                false
            } else {
                *current = site;
                true
            }
        });
    }
}

fn unread_store(key: &str) -> SiteError {
    SiteError::Storage(format!("catalog '{key}' could not be read; reload before writing"))
}

fn missing_polygon() -> SiteError {
    SiteError::validation(Violation::new(Field::Polygons, ViolationKind::MissingPolygon))
}

/// Attach `polygon` to `site_id` in `tree`, refusing a name already used
/// by one of that site's polygons.
fn attach_unique(
    tree: &mut SiteTree,
    config: &RegistryConfig,
    site_id: Uuid,
    polygon: Polygon,
) -> SiteResult<Polygon> {
    let node = tree
        .node(site_id)
        .ok_or_else(|| SiteError::not_found("site", site_id))?;
    if let Some(conflict) = polygon_name_conflict(
        node.polygons(),
        &polygon.name,
        Some(polygon.id),
        config.match_mode(),
    ) {
        return Err(conflict.into());
    }
    tree.attach_polygon(site_id, polygon)
}
