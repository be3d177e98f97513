//! Default catalog used when nothing usable is stored.

use rust_decimal::Decimal;
use sitecat_core::error::SiteResult;
use sitecat_core::models::polygon::{Coordinate, Polygon};
use sitecat_core::models::site::{Site, SiteType};
use sitecat_core::tree::SiteTree;
use uuid::Uuid;

pub const MAIN_PARKING_ID: Uuid = Uuid::from_u128(0x5c7e_0001_0000_4000_8000_0000_0000_0001);
pub const ZONE_A_ID: Uuid = Uuid::from_u128(0x5c7e_0001_0000_4000_8000_0000_0000_0002);
pub const A01_ID: Uuid = Uuid::from_u128(0x5c7e_0001_0000_4000_8000_0000_0000_0003);
pub const A01_BOUNDARY_ID: Uuid = Uuid::from_u128(0x5c7e_0001_0000_4000_8000_0000_0000_0101);

/// Main Parking → Zone A → A-01, with one geofence on the leaf.
pub fn default_sites() -> Vec<Site> {
    let boundary = Polygon {
        id: A01_BOUNDARY_ID,
        name: "A-01 Boundary".into(),
        site_id: A01_ID,
        coordinates: vec![
            Coordinate::new(24.7136, 46.6753),
            Coordinate::new(24.714, 46.676),
            Coordinate::new(24.7132, 46.6765),
        ],
    };

    let a01 = Site {
        id: A01_ID,
        name_en: "A-01".into(),
        name_ar: "أ-01".into(),
        path: "/main-parking/zone-a/a-01".into(),
        site_type: SiteType::Leaf,
        parent_id: Some(ZONE_A_ID),
        children: None,
        price_per_hour: Some(Decimal::new(550, 2)),
        integration_code: Some("MAIN_A01".into()),
        number_of_slots: Some(25),
        polygons: Some(vec![boundary]),
    };

    let zone_a = Site {
        id: ZONE_A_ID,
        name_en: "Zone A".into(),
        name_ar: "المنطقة أ".into(),
        path: "/main-parking/zone-a".into(),
        site_type: SiteType::Parent,
        parent_id: Some(MAIN_PARKING_ID),
        children: Some(vec![a01]),
        price_per_hour: None,
        integration_code: None,
        number_of_slots: None,
        polygons: None,
    };

    vec![Site {
        id: MAIN_PARKING_ID,
        name_en: "Main Parking".into(),
        name_ar: "موقف رئيسي".into(),
        path: "/main-parking".into(),
        site_type: SiteType::Parent,
        parent_id: None,
        children: Some(vec![zone_a]),
        price_per_hour: None,
        integration_code: None,
        number_of_slots: None,
        polygons: None,
    }]
}

pub fn default_tree() -> SiteResult<SiteTree> {
    SiteTree::from_snapshot(default_sites())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitecat_core::models::site::CreateSite;
    use sitecat_core::validation::validate_create;

    #[test]
    fn seed_is_a_valid_tree() {
        let tree = default_tree().unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.snapshot(), default_sites());
    }

    #[test]
    fn seed_leaf_passes_field_rules() {
        let leaf = default_tree().unwrap().find_by_id(A01_ID).unwrap();
        validate_create(&CreateSite {
            name_en: leaf.name_en,
            name_ar: leaf.name_ar,
            parent_id: leaf.parent_id,
            is_leaf: true,
            price_per_hour: leaf.price_per_hour,
            integration_code: leaf.integration_code,
            number_of_slots: leaf.number_of_slots,
            staging_key: None,
        })
        .unwrap();
    }
}
