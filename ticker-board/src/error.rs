use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Failures of the snapshot-fetch collaborator.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum FetchError {
    #[error("no data published for this session yet")]
    NoData,

    #[error("snapshot endpoint returned HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode snapshot: {0}")]
    Decode(String),
}

impl FetchError {
    /// Determine if the upstream simply has nothing for the session yet, as opposed to a real
    /// failure. Only this kind is eligible for the bounded no-data retry.
    pub fn is_no_data(&self) -> bool {
        matches!(self, FetchError::NoData)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) if status == reqwest::StatusCode::NOT_FOUND => Self::NoData,
            Some(status) => Self::Status(status.as_u16()),
            None if error.is_decode() => Self::Decode(error.to_string()),
            None => Self::Transport(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}

/// A snapshot record that cannot enter the symbol cache. Skipped, never fatal to the batch.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Error)]
pub enum RecordError {
    #[error("record has an empty symbol")]
    MissingSymbol,

    #[error("record {0} is missing ceiling, floor or reference price")]
    MissingBounds(SmolStr),
}

/// All errors surfaced by the [`BoardEngine`](crate::engine::BoardEngine) facade.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum EngineError {
    #[error("engine has been shut down")]
    Closed,
}
