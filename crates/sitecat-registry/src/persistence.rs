//! Loading and saving the catalog as one serialized snapshot.

use std::fmt;

use sitecat_core::error::{SiteError, SiteResult};
use sitecat_core::models::site::Site;
use sitecat_core::repository::SnapshotStore;
use sitecat_core::tree::SiteTree;
use tracing::{error, info, warn};

use crate::seed;

/// Why the default catalog was used instead of the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedReason {
    /// Nothing stored under the key.
    Missing,
    /// The stored blob is not a JSON array of sites.
    Corrupt,
    /// The blob parsed but breaks a structural invariant.
    Invalid,
    /// The store could not be read. The default tree is used in memory
    /// only and the store is left untouched.
    Unreadable,
}

impl fmt::Display for SeedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeedReason::Missing => f.write_str("missing"),
            SeedReason::Corrupt => f.write_str("corrupt"),
            SeedReason::Invalid => f.write_str("invalid"),
            SeedReason::Unreadable => f.write_str("unreadable"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Stored,
    Seeded(SeedReason),
}

impl LoadSource {
    /// Whether whatever the store holds is still unknown.
    pub fn is_unreadable(&self) -> bool {
        matches!(self, LoadSource::Seeded(SeedReason::Unreadable))
    }
}

/// Result of [`SnapshotPersistence::load`].
#[derive(Debug)]
pub struct Loaded {
    pub tree: SiteTree,
    pub source: LoadSource,
    /// Whether the store holds exactly `tree` after loading.
    pub persisted: bool,
}

pub fn encode(tree: &SiteTree) -> SiteResult<String> {
    serde_json::to_string(&tree.snapshot())
        .map_err(|e| SiteError::Internal(format!("snapshot serialization failed: {e}")))
}

/// Parse and structurally check a stored blob.
pub fn decode(blob: &str) -> Result<SiteTree, SeedReason> {
    let sites: Vec<Site> = serde_json::from_str(blob).map_err(|e| {
        warn!(error = %e, "Stored catalog is not valid JSON");
        SeedReason::Corrupt
    })?;
    SiteTree::from_snapshot(sites).map_err(|e| {
        warn!(error = %e, "Stored catalog violates tree invariants");
        SeedReason::Invalid
    })
}

/// Reads and writes the whole catalog under a single key.
pub struct SnapshotPersistence<S: SnapshotStore> {
    store: S,
    key: String,
}

impl<S: SnapshotStore> SnapshotPersistence<S> {
    pub fn new(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the stored catalog, falling back to the default tree when
    /// the blob is missing, unparsable or structurally invalid. Such a
    /// fallback is written back immediately. When the store cannot be
    /// read at all, the default tree is returned without writing.
    pub async fn load(&self) -> SiteResult<Loaded> {
        let reason = match self.store.read(&self.key).await {
            Ok(Some(blob)) => match decode(&blob) {
                Ok(tree) => {
                    info!(key = %self.key, sites = tree.len(), "Loaded site catalog");
                    return Ok(Loaded {
                        tree,
                        source: LoadSource::Stored,
                        persisted: true,
                    });
                }
                Err(reason) => reason,
            },
            Ok(None) => SeedReason::Missing,
            Err(e) => {
                error!(
                    key = %self.key,
                    error = %e,
                    "Failed to read site catalog; store left untouched"
                );
                return Ok(Loaded {
                    tree: seed::default_tree()?,
                    source: LoadSource::Seeded(SeedReason::Unreadable),
                    persisted: false,
                });
            }
        };

        let tree = seed::default_tree()?;
        info!(key = %self.key, %reason, "Seeding default site catalog");
        let persisted = match self.save(&tree).await {
            Ok(()) => true,
            Err(e) => {
                error!(key = %self.key, error = %e, "Failed to persist seeded catalog");
                false
            }
        };

        Ok(Loaded {
            tree,
            source: LoadSource::Seeded(reason),
            persisted,
        })
    }

    /// Overwrite the stored blob with `tree`.
    pub async fn save(&self, tree: &SiteTree) -> SiteResult<()> {
        let blob = encode(tree)?;
        self.store.write(&self.key, blob).await
    }

    /// Remove the stored blob.
    pub async fn clear(&self) -> SiteResult<()> {
        self.store.remove(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitecat_core::repository::MemoryStore;

    #[tokio::test]
    async fn unreadable_store_is_not_overwritten() {
        let store = MemoryStore::with_blob("catalog", "[]");
        store.fail_reads(true);
        let persistence = SnapshotPersistence::new(store, "catalog");

        let loaded = persistence.load().await.unwrap();
        assert!(loaded.source.is_unreadable());
        assert!(!loaded.persisted);
        assert_eq!(loaded.tree.len(), 3);
        assert_eq!(persistence.store().get("catalog").as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn missing_blob_is_seeded_and_written() {
        let persistence = SnapshotPersistence::new(MemoryStore::new(), "catalog");
        let loaded = persistence.load().await.unwrap();
        assert_eq!(loaded.source, LoadSource::Seeded(SeedReason::Missing));
        assert!(loaded.persisted);
        assert!(persistence.store().get("catalog").is_some());
    }

    #[test]
    fn decode_rejects_non_json() {
        assert_eq!(decode("{not json").unwrap_err(), SeedReason::Corrupt);
        assert_eq!(decode(r#"{"id": 1}"#).unwrap_err(), SeedReason::Corrupt);
    }

    #[test]
    fn decode_rejects_structural_errors() {
        let mut sites = seed::default_sites();
        sites[0].parent_id = Some(seed::A01_ID);
        let blob = serde_json::to_string(&sites).unwrap();
        assert_eq!(decode(&blob).unwrap_err(), SeedReason::Invalid);
    }

    #[test]
    fn encoded_tree_decodes_losslessly() {
        let tree = seed::default_tree().unwrap();
        let decoded = decode(&encode(&tree).unwrap()).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn encoded_form_uses_wire_field_names() {
        let blob = encode(&seed::default_tree().unwrap()).unwrap();
        for key in [
            "\"nameEn\"",
            "\"nameAr\"",
            "\"type\":\"leaf\"",
            "\"parentId\"",
            "\"pricePerHour\"",
            "\"integrationCode\"",
            "\"numberOfSlots\"",
            "\"siteId\"",
        ] {
            assert!(blob.contains(key), "missing {key}");
        }
    }
}
