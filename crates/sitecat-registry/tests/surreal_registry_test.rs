//! The registry over the SurrealDB snapshot store, using in-memory
//! SurrealDB.

use sitecat_core::models::site::{CreateSite, UpdateSite};
use sitecat_db::SurrealSnapshotStore;
use sitecat_registry::seed::{A01_ID, MAIN_PARKING_ID};
use sitecat_registry::{RegistryConfig, SiteRegistry};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

/// Helper: spin up in-memory DB and run migrations.
async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    sitecat_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn first_open_seeds_the_database() {
    let db = setup().await;
    let registry = SiteRegistry::open(
        SurrealSnapshotStore::new(db.clone()),
        RegistryConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(registry.tree().len(), 3);
    let meta = registry
        .store()
        .meta("sitecat_sites")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(meta.revision, 1);
}

#[tokio::test]
async fn changes_survive_reopening() {
    let db = setup().await;
    let mut registry = SiteRegistry::open(
        SurrealSnapshotStore::new(db.clone()),
        RegistryConfig::default(),
    )
    .await
    .unwrap();

    let lot = registry
        .create_site(CreateSite {
            name_en: "Overflow Lot".into(),
            name_ar: "موقف إضافي".into(),
            parent_id: Some(MAIN_PARKING_ID),
            ..Default::default()
        })
        .await
        .unwrap();
    registry
        .update_site(
            A01_ID,
            UpdateSite {
                name_en: Some("A-01 North".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let expected = registry.sites();
    drop(registry);

    let reopened =
        SiteRegistry::open(SurrealSnapshotStore::new(db), RegistryConfig::default())
            .await
            .unwrap();

    assert_eq!(reopened.sites(), expected);
    assert_eq!(
        reopened.site_by_id(lot.id).unwrap().path,
        "/main-parking/overflow-lot"
    );
    assert_eq!(
        reopened.site_by_id(A01_ID).unwrap().path,
        "/main-parking/zone-a/a-01-north"
    );
}

#[tokio::test]
async fn clear_all_removes_the_record() {
    let db = setup().await;
    let mut registry = SiteRegistry::open(
        SurrealSnapshotStore::new(db.clone()),
        RegistryConfig::default(),
    )
    .await
    .unwrap();

    registry.clear_all().await.unwrap();
    assert!(
        registry
            .store()
            .meta("sitecat_sites")
            .await
            .unwrap()
            .is_none()
    );
}
