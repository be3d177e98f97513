//! Rule evaluation for sites and polygons.
//!
//! Field rules are pure and synchronous: each returns `Ok(())` or a
//! [`ViolationKind`], and a [`Validator`] runs them as an ordered pipeline
//! collecting every [`Violation`]. Cross-entity rules need a snapshot of
//! the tree and live in [`uniqueness`]. The editable-form state machine
//! lives in [`draft`].

pub mod draft;
pub mod rules;
pub mod uniqueness;

use std::fmt;

use crate::error::{SiteError, SiteResult};
use crate::models::site::{CreateSite, UpdateSite};

pub use rules::{CharacterSet, TextRule};

/// The field a violation is reported against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Id,
    NameEn,
    NameAr,
    ParentId,
    Type,
    Children,
    PricePerHour,
    IntegrationCode,
    NumberOfSlots,
    Polygons,
    PolygonName,
    Coordinates,
    Latitude(usize),
    Longitude(usize),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Id => f.write_str("id"),
            Field::NameEn => f.write_str("nameEn"),
            Field::NameAr => f.write_str("nameAr"),
            Field::ParentId => f.write_str("parentId"),
            Field::Type => f.write_str("type"),
            Field::Children => f.write_str("children"),
            Field::PricePerHour => f.write_str("pricePerHour"),
            Field::IntegrationCode => f.write_str("integrationCode"),
            Field::NumberOfSlots => f.write_str("numberOfSlots"),
            Field::Polygons => f.write_str("polygons"),
            Field::PolygonName => f.write_str("polygonName"),
            Field::Coordinates => f.write_str("coordinates"),
            Field::Latitude(i) => write!(f, "coordinates[{i}].latitude"),
            Field::Longitude(i) => write!(f, "coordinates[{i}].longitude"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    Required,
    TooShort { min: usize },
    TooLong { max: usize },
    Charset(CharacterSet),
    OutOfRange { min: String, max: String },
    DecimalPlaces { expected: u32 },
    TooManyDecimals { max: usize },
    NotANumber,
    TooFewVertices { min: usize, actual: usize },
    DuplicateVertex { first: usize, second: usize },
    VertexIndex { index: usize, len: usize },
    LeafRequiresParent,
    LeafOnlyField,
    LeafHasChildren,
    NotUnique { value: String },
    NotALeaf,
    Cycle,
    Mismatch { expected: String },
    DuplicateId,
    MissingPolygon,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Required => f.write_str("is required"),
            ViolationKind::TooShort { min } => write!(f, "must be at least {min} characters"),
            ViolationKind::TooLong { max } => write!(f, "must be at most {max} characters"),
            ViolationKind::Charset(set) => write!(f, "contains characters outside the {set} set"),
            ViolationKind::OutOfRange { min, max } => {
                write!(f, "must be between {min} and {max}")
            }
            ViolationKind::DecimalPlaces { expected } => {
                write!(f, "must have exactly {expected} decimal places")
            }
            ViolationKind::TooManyDecimals { max } => {
                write!(f, "must have at most {max} decimal places")
            }
            ViolationKind::NotANumber => f.write_str("must be a finite number"),
            ViolationKind::TooFewVertices { min, actual } => {
                write!(f, "needs at least {min} vertices, has {actual}")
            }
            ViolationKind::DuplicateVertex { first, second } => {
                write!(f, "vertices {first} and {second} are identical")
            }
            ViolationKind::VertexIndex { index, len } => {
                write!(f, "vertex index {index} out of bounds for {len} vertices")
            }
            ViolationKind::LeafRequiresParent => f.write_str("a leaf site must have a parent"),
            ViolationKind::LeafOnlyField => f.write_str("is only allowed on leaf sites"),
            ViolationKind::LeafHasChildren => f.write_str("a site with children cannot be a leaf"),
            ViolationKind::NotUnique { value } => write!(f, "'{value}' is used more than once"),
            ViolationKind::NotALeaf => f.write_str("site must be a leaf"),
            ViolationKind::Cycle => f.write_str("would make a site its own ancestor"),
            ViolationKind::Mismatch { expected } => write!(f, "expected {expected}"),
            ViolationKind::DuplicateId => f.write_str("is used by more than one site"),
            ViolationKind::MissingPolygon => f.write_str("a leaf site needs at least one polygon"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: Field,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(field: Field, kind: ViolationKind) -> Self {
        Self { field, kind }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.kind)
    }
}

/// Ordered rule pipeline accumulating violations across fields.
#[derive(Debug, Default)]
pub struct Validator {
    violations: Vec<Violation>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run text rules in order. A failed `Required` short-circuits the
    /// field; an absent optional value skips the remaining rules.
    pub fn text(&mut self, field: Field, value: Option<&str>, rules: &[TextRule]) -> &mut Self {
        for rule in rules {
            match rule.check(value) {
                Ok(()) => {}
                Err(ViolationKind::Required) => {
                    self.violations
                        .push(Violation::new(field, ViolationKind::Required));
                    return self;
                }
                Err(kind) => self.violations.push(Violation::new(field.clone(), kind)),
            }
            if rules::is_blank(value) {
                return self;
            }
        }
        self
    }

    /// Record the outcome of a single typed rule.
    pub fn check(&mut self, field: Field, outcome: Result<(), ViolationKind>) -> &mut Self {
        if let Err(kind) = outcome {
            self.violations.push(Violation::new(field, kind));
        }
        self
    }

    pub fn push(&mut self, violation: Violation) -> &mut Self {
        self.violations.push(violation);
        self
    }

    pub fn extend(&mut self, violations: impl IntoIterator<Item = Violation>) -> &mut Self {
        self.violations.extend(violations);
        self
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn finish(self) -> Result<(), Vec<Violation>> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(self.violations)
        }
    }

    /// Fail closed with [`SiteError::Validation`] if anything was recorded.
    pub fn into_result(self) -> SiteResult<()> {
        self.finish()
            .map_err(|violations| SiteError::Validation { violations })
    }
}

const NAME_MIN: usize = 3;
const NAME_MAX: usize = 100;

pub(crate) const fn name_rules(set: CharacterSet) -> [TextRule; 3] {
    [
        TextRule::Required,
        TextRule::Length {
            min: NAME_MIN,
            max: NAME_MAX,
        },
        TextRule::Charset(set),
    ]
}

pub(crate) const fn optional_name_rules(set: CharacterSet) -> [TextRule; 2] {
    [
        TextRule::Length {
            min: NAME_MIN,
            max: NAME_MAX,
        },
        TextRule::Charset(set),
    ]
}

/// Field rules for a site creation request.
///
/// Leaf-only fields are mandatory for leaves and must be absent for
/// parents. Polygon presence is a submission concern checked by the
/// caller once staged polygons are known.
pub fn validate_create(input: &CreateSite) -> SiteResult<()> {
    let mut v = Validator::new();
    v.text(
        Field::NameEn,
        Some(input.name_en.as_str()),
        &name_rules(CharacterSet::English),
    )
    .text(
        Field::NameAr,
        Some(input.name_ar.as_str()),
        &name_rules(CharacterSet::Arabic),
    );

    if input.is_leaf {
        if input.parent_id.is_none() {
            v.push(Violation::new(Field::Type, ViolationKind::LeafRequiresParent));
        }
        leaf_field_rules(
            &mut v,
            input.price_per_hour.as_ref(),
            input.integration_code.as_deref(),
            input.number_of_slots,
            true,
        );
    } else {
        reject_leaf_fields(
            &mut v,
            input.price_per_hour.is_some(),
            input.integration_code.is_some(),
            input.number_of_slots.is_some(),
        );
    }

    v.into_result()
}

/// Field rules for the fields present in a partial update.
///
/// Whether leaf fields are required depends on the site's current type,
/// which the tree resolves when the patch is applied.
pub fn validate_update(input: &UpdateSite) -> SiteResult<()> {
    let mut v = Validator::new();
    v.text(
        Field::NameEn,
        input.name_en.as_deref(),
        &optional_name_rules(CharacterSet::English),
    )
    .text(
        Field::NameAr,
        input.name_ar.as_deref(),
        &optional_name_rules(CharacterSet::Arabic),
    );
    if input.name_en.as_deref().is_some_and(|n| rules::is_blank(Some(n))) {
        v.push(Violation::new(Field::NameEn, ViolationKind::Required));
    }
    if input.name_ar.as_deref().is_some_and(|n| rules::is_blank(Some(n))) {
        v.push(Violation::new(Field::NameAr, ViolationKind::Required));
    }

    if input.is_leaf == Some(false) {
        reject_leaf_fields(
            &mut v,
            input.price_per_hour.is_some(),
            input.integration_code.is_some(),
            input.number_of_slots.is_some(),
        );
    } else {
        leaf_field_rules(
            &mut v,
            input.price_per_hour.as_ref(),
            input.integration_code.as_deref(),
            input.number_of_slots,
            false,
        );
    }

    v.into_result()
}

pub(crate) fn leaf_field_rules(
    v: &mut Validator,
    price: Option<&rust_decimal::Decimal>,
    code: Option<&str>,
    slots: Option<u32>,
    required: bool,
) {
    match price {
        Some(price) => {
            v.check(Field::PricePerHour, rules::price(price));
        }
        None if required => {
            v.push(Violation::new(Field::PricePerHour, ViolationKind::Required));
        }
        None => {}
    }

    if required {
        v.text(
            Field::IntegrationCode,
            code,
            &name_rules(CharacterSet::English),
        );
    } else {
        v.text(
            Field::IntegrationCode,
            code,
            &optional_name_rules(CharacterSet::English),
        );
    }

    match slots {
        Some(slots) => {
            v.check(Field::NumberOfSlots, rules::slots(slots));
        }
        None if required => {
            v.push(Violation::new(Field::NumberOfSlots, ViolationKind::Required));
        }
        None => {}
    }
}

fn reject_leaf_fields(v: &mut Validator, price: bool, code: bool, slots: bool) {
    for (present, field) in [
        (price, Field::PricePerHour),
        (code, Field::IntegrationCode),
        (slots, Field::NumberOfSlots),
    ] {
        if present {
            v.push(Violation::new(field, ViolationKind::LeafOnlyField));
        }
    }
}
