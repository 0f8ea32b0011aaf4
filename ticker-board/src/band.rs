//! Price-band classification of a value against the session ceiling, floor and reference.
//!
//! Stateless and cheap; bands are re-derived on every view-model read rather than cached.

use crate::format::DisplayValue;
use serde::{Deserialize, Serialize};

/// Equality tolerance absorbing floating-point noise from upstream feeds.
pub const BAND_EPSILON: f64 = 0.001;

/// Position of a value relative to the session bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum Band {
    AtCeiling,
    AtFloor,
    AtReference,
    AboveReference,
    BelowReference,
    #[default]
    Unknown,
}

/// Classify a displayed value against the displayed session bounds.
///
/// Any sentinel or non-numeric input yields [`Band::Unknown`].
pub fn classify(
    value: &DisplayValue,
    reference: &DisplayValue,
    ceiling: &DisplayValue,
    floor: &DisplayValue,
) -> Band {
    match (
        value.as_f64(),
        reference.as_f64(),
        ceiling.as_f64(),
        floor.as_f64(),
    ) {
        (Some(value), Some(reference), Some(ceiling), Some(floor)) => {
            classify_price(value, reference, ceiling, floor)
        }
        _ => Band::Unknown,
    }
}

/// Numeric core of [`classify`].
///
/// Equality checks run before the open-interval checks: a thinly traded symbol whose reference
/// equals its ceiling must read as [`Band::AtReference`].
pub fn classify_price(value: f64, reference: f64, ceiling: f64, floor: f64) -> Band {
    if ![value, reference, ceiling, floor].iter().all(|x| x.is_finite()) {
        return Band::Unknown;
    }

    let eq = |a: f64, b: f64| (a - b).abs() < BAND_EPSILON;

    if eq(value, reference) {
        Band::AtReference
    } else if eq(value, ceiling) {
        Band::AtCeiling
    } else if eq(value, floor) {
        Band::AtFloor
    } else if value > reference && value < ceiling {
        Band::AboveReference
    } else if value > floor && value < reference {
        Band::BelowReference
    } else {
        Band::Unknown
    }
}
