use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Exchanges the board can display.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Exchange {
    #[display("HOSE")]
    #[serde(rename = "HOSE", alias = "hose", alias = "Hose")]
    Hose,
    #[display("HNX")]
    #[serde(rename = "HNX", alias = "hnx", alias = "Hnx")]
    Hnx,
}

impl Exchange {
    pub const ALL: [Exchange; 2] = [Exchange::Hose, Exchange::Hnx];

    /// Upper-case exchange code, as used in URLs and push events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Hose => "HOSE",
            Exchange::Hnx => "HNX",
        }
    }

    /// The secondary exchange opens its session data later than the primary and may answer
    /// "no data" for a while after the board is opened.
    pub fn is_secondary(&self) -> bool {
        matches!(self, Exchange::Hnx)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown exchange: {0}")]
pub struct ParseExchangeError(pub String);

impl FromStr for Exchange {
    type Err = ParseExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HOSE" => Ok(Exchange::Hose),
            "HNX" => Ok(Exchange::Hnx),
            _ => Err(ParseExchangeError(s.to_string())),
        }
    }
}

/// Whole exchange, or the user's curated subset of it.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    #[display("board")]
    Board,
    #[display("watchlist")]
    Watchlist,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Board => "board",
            ViewMode::Watchlist => "watchlist",
        }
    }
}

/// The single active (exchange, mode) pair.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[display("{exchange}/{mode}")]
pub struct ViewSelection {
    pub exchange: Exchange,
    pub mode: ViewMode,
}

impl ViewSelection {
    pub fn new(exchange: Exchange, mode: ViewMode) -> Self {
        Self { exchange, mode }
    }

    pub fn board(exchange: Exchange) -> Self {
        Self::new(exchange, ViewMode::Board)
    }

    pub fn watchlist(exchange: Exchange) -> Self {
        Self::new(exchange, ViewMode::Watchlist)
    }
}

impl Default for ViewSelection {
    fn default() -> Self {
        Self::board(Exchange::Hose)
    }
}

/// "Something changed on this exchange" notification from the push transport.
///
/// Carries no market data; it only hints that a refetch may be worthwhile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PushEvent {
    pub exchange: String,
    #[serde(default)]
    pub timestamp: String,
}

impl PushEvent {
    pub fn new(exchange: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Parse the exchange tag.
    pub fn exchange(&self) -> Result<Exchange, ParseExchangeError> {
        self.exchange.parse()
    }

    /// Event time, when the transport sent an RFC 3339 timestamp.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|time| time.with_timezone(&Utc))
    }
}
