use super::field::Field;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A raw snapshot value exactly as upstream sent it.
///
/// Feeds mix JSON numbers and pre-formatted strings ("1,234,500") for the same field, so both
/// are accepted here and normalised by the formatter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Numeric reading of the value, ignoring grouping separators. `None` when not finite or
    /// not numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(number) => number.is_finite().then_some(*number),
            RawValue::Text(text) => parse_number(text),
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

/// Parse a possibly grouped number such as `"1,234,500"` or `" 10.25 "`.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '_' | ' '))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|number| number.is_finite())
}

/// One symbol's row in an exchange snapshot.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRecord {
    #[serde(alias = "code", alias = "ticker")]
    pub symbol: SmolStr,

    // Session bounds
    #[serde(alias = "ceilingPrice", alias = "ceil")]
    pub ceiling: Option<RawValue>,
    #[serde(alias = "floorPrice")]
    pub floor: Option<RawValue>,
    #[serde(alias = "refPrice", alias = "ref", alias = "basicPrice")]
    pub reference: Option<RawValue>,

    // Bid depth
    pub bid_price_3: Option<RawValue>,
    pub bid_volume_3: Option<RawValue>,
    pub bid_price_2: Option<RawValue>,
    pub bid_volume_2: Option<RawValue>,
    pub bid_price_1: Option<RawValue>,
    pub bid_volume_1: Option<RawValue>,

    // Last match
    pub match_price: Option<RawValue>,
    pub match_volume: Option<RawValue>,
    #[serde(alias = "changePercent")]
    pub match_change_percent: Option<RawValue>,

    // Ask depth
    pub ask_price_1: Option<RawValue>,
    pub ask_volume_1: Option<RawValue>,
    pub ask_price_2: Option<RawValue>,
    pub ask_volume_2: Option<RawValue>,
    pub ask_price_3: Option<RawValue>,
    pub ask_volume_3: Option<RawValue>,

    // Session statistics
    #[serde(alias = "accumulatedVolume")]
    pub total_volume: Option<RawValue>,
    pub high: Option<RawValue>,
    pub low: Option<RawValue>,
    #[serde(alias = "foreignBuy")]
    pub foreign_buy_volume: Option<RawValue>,
    #[serde(alias = "foreignSell")]
    pub foreign_sell_volume: Option<RawValue>,
}

impl SymbolRecord {
    pub fn new(symbol: impl Into<SmolStr>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// Set the session bounds.
    pub fn with_bounds(
        mut self,
        reference: impl Into<RawValue>,
        ceiling: impl Into<RawValue>,
        floor: impl Into<RawValue>,
    ) -> Self {
        self.reference = Some(reference.into());
        self.ceiling = Some(ceiling.into());
        self.floor = Some(floor.into());
        self
    }

    /// Set one mutable field.
    pub fn with(mut self, field: Field, value: impl Into<RawValue>) -> Self {
        *self.slot_mut(field) = Some(value.into());
        self
    }

    pub fn raw(&self, field: Field) -> Option<&RawValue> {
        match field {
            Field::BidPrice3 => self.bid_price_3.as_ref(),
            Field::BidVolume3 => self.bid_volume_3.as_ref(),
            Field::BidPrice2 => self.bid_price_2.as_ref(),
            Field::BidVolume2 => self.bid_volume_2.as_ref(),
            Field::BidPrice1 => self.bid_price_1.as_ref(),
            Field::BidVolume1 => self.bid_volume_1.as_ref(),
            Field::MatchPrice => self.match_price.as_ref(),
            Field::MatchVolume => self.match_volume.as_ref(),
            Field::MatchChangePercent => self.match_change_percent.as_ref(),
            Field::AskPrice1 => self.ask_price_1.as_ref(),
            Field::AskVolume1 => self.ask_volume_1.as_ref(),
            Field::AskPrice2 => self.ask_price_2.as_ref(),
            Field::AskVolume2 => self.ask_volume_2.as_ref(),
            Field::AskPrice3 => self.ask_price_3.as_ref(),
            Field::AskVolume3 => self.ask_volume_3.as_ref(),
            Field::TotalVolume => self.total_volume.as_ref(),
            Field::High => self.high.as_ref(),
            Field::Low => self.low.as_ref(),
            Field::ForeignBuyVolume => self.foreign_buy_volume.as_ref(),
            Field::ForeignSellVolume => self.foreign_sell_volume.as_ref(),
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<RawValue> {
        match field {
            Field::BidPrice3 => &mut self.bid_price_3,
            Field::BidVolume3 => &mut self.bid_volume_3,
            Field::BidPrice2 => &mut self.bid_price_2,
            Field::BidVolume2 => &mut self.bid_volume_2,
            Field::BidPrice1 => &mut self.bid_price_1,
            Field::BidVolume1 => &mut self.bid_volume_1,
            Field::MatchPrice => &mut self.match_price,
            Field::MatchVolume => &mut self.match_volume,
            Field::MatchChangePercent => &mut self.match_change_percent,
            Field::AskPrice1 => &mut self.ask_price_1,
            Field::AskVolume1 => &mut self.ask_volume_1,
            Field::AskPrice2 => &mut self.ask_price_2,
            Field::AskVolume2 => &mut self.ask_volume_2,
            Field::AskPrice3 => &mut self.ask_price_3,
            Field::AskVolume3 => &mut self.ask_volume_3,
            Field::TotalVolume => &mut self.total_volume,
            Field::High => &mut self.high,
            Field::Low => &mut self.low,
            Field::ForeignBuyVolume => &mut self.foreign_buy_volume,
            Field::ForeignSellVolume => &mut self.foreign_sell_volume,
        }
    }
}
