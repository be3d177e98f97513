//! Stateless field rules.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use super::ViolationKind;

static ENGLISH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9\s\-_.]+$").expect("english character set pattern")
});

static ARABIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[\x{0600}-\x{06FF}\x{0750}-\x{077F}\x{08A0}-\x{08FF}\x{FB50}-\x{FDFF}\x{FE70}-\x{FEFF}0-9\s\-_.]+$",
    )
    .expect("arabic character set pattern")
});

static MIXED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[\x{0600}-\x{06FF}\x{0750}-\x{077F}\x{08A0}-\x{08FF}\x{FB50}-\x{FDFF}\x{FE70}-\x{FEFF}A-Za-z0-9\s\-_.]+$",
    )
    .expect("mixed character set pattern")
});

/// Allowed alphabets for text fields. All three also admit digits,
/// whitespace, `-`, `_` and `.`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterSet {
    English,
    Arabic,
    /// Union of English and Arabic, used for bilingual polygon names.
    Mixed,
}

impl CharacterSet {
    pub fn matches(&self, value: &str) -> bool {
        let pattern = match self {
            CharacterSet::English => &ENGLISH,
            CharacterSet::Arabic => &ARABIC,
            CharacterSet::Mixed => &MIXED,
        };
        pattern.is_match(value)
    }
}

impl fmt::Display for CharacterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacterSet::English => f.write_str("english"),
            CharacterSet::Arabic => f.write_str("arabic"),
            CharacterSet::Mixed => f.write_str("mixed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRule {
    Required,
    /// Bounds in characters, inclusive.
    Length { min: usize, max: usize },
    Charset(CharacterSet),
}

impl TextRule {
    /// Blank values only fail `Required`; the other rules skip them.
    pub fn check(&self, value: Option<&str>) -> Result<(), ViolationKind> {
        if is_blank(value) {
            return match self {
                TextRule::Required => Err(ViolationKind::Required),
                _ => Ok(()),
            };
        }
        let value = value.unwrap_or_default();
        match self {
            TextRule::Required => Ok(()),
            TextRule::Length { min, max } => {
                let len = value.chars().count();
                if len < *min {
                    Err(ViolationKind::TooShort { min: *min })
                } else if len > *max {
                    Err(ViolationKind::TooLong { max: *max })
                } else {
                    Ok(())
                }
            }
            TextRule::Charset(set) => {
                if set.matches(value) {
                    Ok(())
                } else {
                    Err(ViolationKind::Charset(*set))
                }
            }
        }
    }
}

pub(crate) fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

const PRICE_MIN: Decimal = Decimal::from_parts(1, 0, 0, false, 2);
const PRICE_MAX: Decimal = Decimal::from_parts(99_999, 0, 0, false, 2);
const PRICE_SCALE: u32 = 2;

pub const SLOTS_MIN: u32 = 1;
pub const SLOTS_MAX: u32 = 10_000;

pub const COORDINATE_MAX_DECIMALS: usize = 6;

/// Hourly price: within `[0.01, 999.99]` and written with exactly two
/// decimal places (`5.50`, not `5.5`).
pub fn price(value: &Decimal) -> Result<(), ViolationKind> {
    if *value < PRICE_MIN || *value > PRICE_MAX {
        return Err(ViolationKind::OutOfRange {
            min: PRICE_MIN.to_string(),
            max: PRICE_MAX.to_string(),
        });
    }
    if value.scale() != PRICE_SCALE {
        return Err(ViolationKind::DecimalPlaces {
            expected: PRICE_SCALE,
        });
    }
    Ok(())
}

pub fn slots(value: u32) -> Result<(), ViolationKind> {
    if (SLOTS_MIN..=SLOTS_MAX).contains(&value) {
        Ok(())
    } else {
        Err(ViolationKind::OutOfRange {
            min: SLOTS_MIN.to_string(),
            max: SLOTS_MAX.to_string(),
        })
    }
}

pub fn latitude(value: f64) -> Result<(), ViolationKind> {
    degrees(value, 90.0)
}

pub fn longitude(value: f64) -> Result<(), ViolationKind> {
    degrees(value, 180.0)
}

fn degrees(value: f64, bound: f64) -> Result<(), ViolationKind> {
    if !value.is_finite() {
        return Err(ViolationKind::NotANumber);
    }
    if !(-bound..=bound).contains(&value) {
        return Err(ViolationKind::OutOfRange {
            min: format!("-{bound}"),
            max: bound.to_string(),
        });
    }
    if decimal_places(value) > COORDINATE_MAX_DECIMALS {
        return Err(ViolationKind::TooManyDecimals {
            max: COORDINATE_MAX_DECIMALS,
        });
    }
    Ok(())
}

/// Digits after the point in the shortest round-trip rendering.
fn decimal_places(value: f64) -> usize {
    let rendered = value.to_string();
    rendered
        .split_once('.')
        .map(|(_, fraction)| fraction.len())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_set() {
        assert!(CharacterSet::English.matches("Main Parking_2.0-b"));
        assert!(!CharacterSet::English.matches("Main!"));
        assert!(!CharacterSet::English.matches("موقف"));
        assert!(!CharacterSet::English.matches(""));
    }

    #[test]
    fn arabic_set() {
        assert!(CharacterSet::Arabic.matches("موقف رئيسي"));
        assert!(CharacterSet::Arabic.matches("أ-01"));
        assert!(!CharacterSet::Arabic.matches("Zone أ"));
    }

    #[test]
    fn mixed_set() {
        assert!(CharacterSet::Mixed.matches("Gate البوابة 3"));
        assert!(!CharacterSet::Mixed.matches("Gate #3"));
    }

    #[test]
    fn required_rejects_blank() {
        assert_eq!(TextRule::Required.check(None), Err(ViolationKind::Required));
        assert_eq!(TextRule::Required.check(Some("  ")), Err(ViolationKind::Required));
        assert_eq!(TextRule::Required.check(Some("abc")), Ok(()));
    }

    #[test]
    fn length_counts_characters() {
        let rule = TextRule::Length { min: 3, max: 5 };
        assert_eq!(rule.check(Some("أبج")), Ok(()));
        assert_eq!(rule.check(Some("ab")), Err(ViolationKind::TooShort { min: 3 }));
        assert_eq!(rule.check(Some("abcdef")), Err(ViolationKind::TooLong { max: 5 }));
        assert_eq!(rule.check(None), Ok(()));
    }

    #[test]
    fn price_needs_two_decimals_in_range() {
        assert_eq!(price(&Decimal::new(550, 2)), Ok(()));
        assert_eq!(price(&Decimal::new(1, 2)), Ok(()));
        assert_eq!(price(&Decimal::new(99_999, 2)), Ok(()));
        assert_eq!(
            price(&Decimal::new(55, 1)),
            Err(ViolationKind::DecimalPlaces { expected: 2 })
        );
        assert_eq!(
            price(&Decimal::new(5, 0)),
            Err(ViolationKind::DecimalPlaces { expected: 2 })
        );
        assert!(matches!(
            price(&Decimal::new(0, 2)),
            Err(ViolationKind::OutOfRange { .. })
        ));
        assert!(matches!(
            price(&Decimal::new(100_000, 2)),
            Err(ViolationKind::OutOfRange { .. })
        ));
        assert!(matches!(
            price(&Decimal::new(-550, 2)),
            Err(ViolationKind::OutOfRange { .. })
        ));
    }

    #[test]
    fn slot_bounds() {
        assert_eq!(slots(1), Ok(()));
        assert_eq!(slots(10_000), Ok(()));
        assert!(slots(0).is_err());
        assert!(slots(10_001).is_err());
    }

    #[test]
    fn coordinate_range_and_precision() {
        assert_eq!(latitude(90.0), Ok(()));
        assert_eq!(latitude(-45.123456), Ok(()));
        assert!(matches!(latitude(90.5), Err(ViolationKind::OutOfRange { .. })));
        assert_eq!(
            latitude(12.1234567),
            Err(ViolationKind::TooManyDecimals { max: 6 })
        );
        assert_eq!(longitude(-180.0), Ok(()));
        assert!(matches!(longitude(180.1), Err(ViolationKind::OutOfRange { .. })));
        assert_eq!(longitude(f64::NAN), Err(ViolationKind::NotANumber));
    }
}
