//! Normalisation boundary between raw snapshot values and the symbol cache.
//!
//! Every value entering the cache passes through here first. Zero is treated as "not traded"
//! and rendered as the no-data sentinel, never as `0`.

use crate::model::{FieldKind, RawValue, parse_number};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Rendered form of a missing, empty or zero value.
pub const NO_DATA: &str = "--";

/// Decimal places kept for prices before trailing zeros are dropped.
const PRICE_DP: u32 = 6;

/// A display-ready cell value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
pub enum DisplayValue {
    #[default]
    NoData,
    Text(String),
}

impl DisplayValue {
    pub fn as_str(&self) -> &str {
        match self {
            DisplayValue::NoData => NO_DATA,
            DisplayValue::Text(text) => text,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, DisplayValue::NoData)
    }

    /// Numeric reading with grouping separators stripped. `None` for the sentinel and for
    /// non-numeric text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DisplayValue::NoData => None,
            DisplayValue::Text(text) => parse_number(text),
        }
    }
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format a raw value without field-specific styling.
pub fn format(raw: Option<&RawValue>) -> DisplayValue {
    format_with(None, raw)
}

/// Format a raw value the way its field is rendered on the board: prices normalised,
/// percentages to 2 dp, volumes as grouped integers.
pub fn format_field(kind: FieldKind, raw: Option<&RawValue>) -> DisplayValue {
    format_with(Some(kind), raw)
}

fn format_with(kind: Option<FieldKind>, raw: Option<&RawValue>) -> DisplayValue {
    match raw {
        None => DisplayValue::NoData,
        Some(RawValue::Number(number)) => format_number(kind, *number),
        Some(RawValue::Text(text)) => {
            let text = text.trim();
            if text.is_empty() || text == NO_DATA {
                return DisplayValue::NoData;
            }
            match parse_number(text) {
                Some(number) => format_number(kind, number),
                None => DisplayValue::Text(text.to_string()),
            }
        }
    }
}

fn format_number(kind: Option<FieldKind>, number: f64) -> DisplayValue {
    if !number.is_finite() || number == 0.0 {
        return DisplayValue::NoData;
    }

    let Ok(decimal) = number.to_string().parse::<Decimal>() else {
        return DisplayValue::Text(number.to_string());
    };

    let rounded = match kind {
        Some(FieldKind::Volume) => {
            return match decimal.round().to_i128() {
                Some(0) | None => DisplayValue::NoData,
                Some(volume) => DisplayValue::Text(group_thousands(volume)),
            };
        }
        Some(FieldKind::Percent) => decimal.round_dp(2),
        // Rounding absorbs float noise such as 0.30000000000000004
        Some(FieldKind::Price) | None => decimal.round_dp(PRICE_DP),
    };

    // Anything that rounds away renders as the sentinel, never as "0"
    if rounded.is_zero() {
        return DisplayValue::NoData;
    }

    DisplayValue::Text(rounded.normalize().to_string())
}

fn group_thousands(value: i128) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    if value < 0 {
        grouped.push('-');
    }
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn text(value: &str) -> DisplayValue {
        DisplayValue::Text(value.to_string())
    }

    #[test]
    fn test_format_no_data_inputs() {
        struct TestCase {
            input: Option<RawValue>,
        }

        let tests = vec![
            // TC0: missing
            TestCase { input: None },
            // TC1: zero number
            TestCase { input: Some(RawValue::Number(0.0)) },
            // TC2: empty string
            TestCase { input: Some(RawValue::Text(String::new())) },
            // TC3: zero string
            TestCase { input: Some(RawValue::Text("0".to_string())) },
            // TC4: not finite
            TestCase { input: Some(RawValue::Number(f64::NAN)) },
            // TC5: sentinel itself
            TestCase { input: Some(RawValue::Text(NO_DATA.to_string())) },
            // TC6: below the price precision
            TestCase { input: Some(RawValue::Number(1e-7)) },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = format(test.input.as_ref());
            assert_eq!(actual, DisplayValue::NoData, "TC{} failed", index);
        }

        let rounds_to_zero = [
            (FieldKind::Percent, RawValue::Number(0.004)),
            (FieldKind::Percent, RawValue::Number(-1e-15)),
            (FieldKind::Percent, RawValue::Text("-0.001".to_string())),
            (FieldKind::Price, RawValue::Number(1e-7)),
        ];
        for (kind, raw) in rounds_to_zero {
            assert_eq!(format_field(kind, Some(&raw)), DisplayValue::NoData, "{raw:?}");
        }
    }

    #[test]
    fn test_format_field() {
        struct TestCase {
            kind: FieldKind,
            input: RawValue,
            expected: DisplayValue,
        }

        let tests = vec![
            TestCase {
                // TC0: price normalised
                kind: FieldKind::Price,
                input: RawValue::Number(10.20),
                expected: text("10.2"),
            },
            TestCase {
                // TC1: float noise collapses
                kind: FieldKind::Price,
                input: RawValue::Number(0.1 + 0.2),
                expected: text("0.3"),
            },
            TestCase {
                // TC2: volume grouped
                kind: FieldKind::Volume,
                input: RawValue::Number(1_234_500.0),
                expected: text("1,234,500"),
            },
            TestCase {
                // TC3: grouped volume string is understood
                kind: FieldKind::Volume,
                input: RawValue::Text("12,300".to_string()),
                expected: text("12,300"),
            },
            TestCase {
                // TC4: percent rounded
                kind: FieldKind::Percent,
                input: RawValue::Number(-1.256),
                expected: text("-1.26"),
            },
            TestCase {
                // TC5: non-numeric text passes through
                kind: FieldKind::Price,
                input: RawValue::Text("ATO".to_string()),
                expected: text("ATO"),
            },
            TestCase {
                // TC6: sub-share volume rounds to nothing traded
                kind: FieldKind::Volume,
                input: RawValue::Number(0.4),
                expected: DisplayValue::NoData,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = format_field(test.kind, Some(&test.input));
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_format_is_idempotent() {
        let inputs = [
            (FieldKind::Price, RawValue::Number(66.2)),
            (FieldKind::Volume, RawValue::Number(987_654_321.0)),
            (FieldKind::Percent, RawValue::Number(0.333)),
            (FieldKind::Price, RawValue::Number(0.0)),
            (FieldKind::Percent, RawValue::Number(0.004)),
            (FieldKind::Percent, RawValue::Number(-1e-15)),
            (FieldKind::Price, RawValue::Number(1e-7)),
        ];

        for (kind, raw) in inputs {
            let once = format_field(kind, Some(&raw));
            let twice = format_field(kind, Some(&RawValue::Text(once.to_string())));
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(-1_234_567), "-1,234,567");
    }

    #[test]
    fn test_display_value_as_f64() {
        assert_eq!(text("1,000").as_f64(), Some(1000.0));
        assert_eq!(DisplayValue::NoData.as_f64(), None);
        assert_eq!(DisplayValue::NoData.to_string(), NO_DATA);

        let decimal = "10.2".parse::<Decimal>().unwrap();
        assert_eq!(decimal, dec!(10.2));
    }
}
