use derive_more::Display;
use serde::{Deserialize, Serialize};

/// How a field's raw value is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Price,
    Volume,
    Percent,
}

/// Mutable per-symbol board fields. Declaration order is board column order.
///
/// Session bounds (ceiling, floor, reference) are not fields: they never change within a
/// session and never animate.
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize,
)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    BidPrice3,
    BidVolume3,
    BidPrice2,
    BidVolume2,
    BidPrice1,
    BidVolume1,
    MatchPrice,
    MatchVolume,
    MatchChangePercent,
    AskPrice1,
    AskVolume1,
    AskPrice2,
    AskVolume2,
    AskPrice3,
    AskVolume3,
    TotalVolume,
    High,
    Low,
    ForeignBuyVolume,
    ForeignSellVolume,
}

impl Field {
    pub const ALL: [Field; 20] = [
        Field::BidPrice3,
        Field::BidVolume3,
        Field::BidPrice2,
        Field::BidVolume2,
        Field::BidPrice1,
        Field::BidVolume1,
        Field::MatchPrice,
        Field::MatchVolume,
        Field::MatchChangePercent,
        Field::AskPrice1,
        Field::AskVolume1,
        Field::AskPrice2,
        Field::AskVolume2,
        Field::AskPrice3,
        Field::AskVolume3,
        Field::TotalVolume,
        Field::High,
        Field::Low,
        Field::ForeignBuyVolume,
        Field::ForeignSellVolume,
    ];

    pub fn kind(&self) -> FieldKind {
        match self {
            Field::BidPrice3
            | Field::BidPrice2
            | Field::BidPrice1
            | Field::MatchPrice
            | Field::AskPrice1
            | Field::AskPrice2
            | Field::AskPrice3
            | Field::High
            | Field::Low => FieldKind::Price,
            Field::MatchChangePercent => FieldKind::Percent,
            Field::BidVolume3
            | Field::BidVolume2
            | Field::BidVolume1
            | Field::MatchVolume
            | Field::AskVolume1
            | Field::AskVolume2
            | Field::AskVolume3
            | Field::TotalVolume
            | Field::ForeignBuyVolume
            | Field::ForeignSellVolume => FieldKind::Volume,
        }
    }

    /// The price whose band colours this field.
    ///
    /// Depth volumes follow their paired price, match volume and percent follow the match price.
    /// Total and foreign volumes are always rendered neutral.
    pub fn band_source(&self) -> Option<Field> {
        match self {
            Field::BidVolume3 => Some(Field::BidPrice3),
            Field::BidVolume2 => Some(Field::BidPrice2),
            Field::BidVolume1 => Some(Field::BidPrice1),
            Field::MatchVolume | Field::MatchChangePercent => Some(Field::MatchPrice),
            Field::AskVolume1 => Some(Field::AskPrice1),
            Field::AskVolume2 => Some(Field::AskPrice2),
            Field::AskVolume3 => Some(Field::AskPrice3),
            Field::TotalVolume | Field::ForeignBuyVolume | Field::ForeignSellVolume => None,
            price => Some(*price),
        }
    }

    /// Accumulated volume only ever grows, so flashing it on every update is noise.
    pub fn is_animated(&self) -> bool {
        !matches!(self, Field::TotalVolume)
    }

    /// Short column header.
    pub fn label(&self) -> &'static str {
        match self {
            Field::BidPrice3 => "B3",
            Field::BidVolume3 => "BV3",
            Field::BidPrice2 => "B2",
            Field::BidVolume2 => "BV2",
            Field::BidPrice1 => "B1",
            Field::BidVolume1 => "BV1",
            Field::MatchPrice => "Match",
            Field::MatchVolume => "MVol",
            Field::MatchChangePercent => "%",
            Field::AskPrice1 => "A1",
            Field::AskVolume1 => "AV1",
            Field::AskPrice2 => "A2",
            Field::AskVolume2 => "AV2",
            Field::AskPrice3 => "A3",
            Field::AskVolume3 => "AV3",
            Field::TotalVolume => "Total",
            Field::High => "High",
            Field::Low => "Low",
            Field::ForeignBuyVolume => "F.Buy",
            Field::ForeignSellVolume => "F.Sell",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_source() {
        struct TestCase {
            input: Field,
            expected: Option<Field>,
        }

        let tests = vec![
            TestCase {
                // TC0: price is banded by itself
                input: Field::AskPrice2,
                expected: Some(Field::AskPrice2),
            },
            TestCase {
                // TC1: depth volume follows its paired price
                input: Field::BidVolume1,
                expected: Some(Field::BidPrice1),
            },
            TestCase {
                // TC2: percent change follows the match price
                input: Field::MatchChangePercent,
                expected: Some(Field::MatchPrice),
            },
            TestCase {
                // TC3: accumulated volume is neutral
                input: Field::TotalVolume,
                expected: None,
            },
            TestCase {
                // TC4: foreign flow is neutral
                input: Field::ForeignSellVolume,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.band_source();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_only_total_volume_is_not_animated() {
        let still: Vec<_> = Field::ALL.iter().filter(|field| !field.is_animated()).collect();
        assert_eq!(still, vec![&Field::TotalVolume]);
    }

    #[test]
    fn test_all_is_sorted_by_column_order() {
        let mut sorted = Field::ALL;
        sorted.sort();
        assert_eq!(sorted, Field::ALL);
    }
}
