//! Snapshot-fetch collaborator.

use crate::{
    error::FetchError,
    model::{Exchange, SymbolRecord, ViewMode, ViewSelection},
};
use async_trait::async_trait;
use itertools::Itertools;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

/// Parameters of one snapshot request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub exchange: Exchange,
    pub mode: ViewMode,
    /// Watchlist filter. `None` lets the upstream decide (whole board, or the user's stored
    /// watchlist).
    pub symbols: Option<Vec<String>>,
}

impl SnapshotRequest {
    pub fn for_selection(selection: ViewSelection, watchlist: &[String]) -> Self {
        let symbols = match selection.mode {
            ViewMode::Watchlist if !watchlist.is_empty() => Some(watchlist.to_vec()),
            _ => None,
        };

        Self {
            exchange: selection.exchange,
            mode: selection.mode,
            symbols,
        }
    }
}

/// Fetches one exchange snapshot. Must tolerate cold starts and be safe to retry.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync + 'static {
    async fn fetch_snapshot(
        &self,
        request: &SnapshotRequest,
    ) -> Result<Vec<SymbolRecord>, FetchError>;
}

/// [`SnapshotFetcher`] over HTTP: `GET {base_url}/snapshot/{EXCHANGE}?mode=..&symbols=..`.
#[derive(Debug, Clone)]
pub struct HttpSnapshotFetcher {
    client: Client,
    base_url: String,
}

impl HttpSnapshotFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, exchange: Exchange) -> String {
        format!(
            "{}/snapshot/{}",
            self.base_url.trim_end_matches('/'),
            exchange.as_str()
        )
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch_snapshot(
        &self,
        request: &SnapshotRequest,
    ) -> Result<Vec<SymbolRecord>, FetchError> {
        let mut query = vec![("mode", request.mode.as_str().to_string())];
        if let Some(symbols) = &request.symbols {
            query.push(("symbols", symbols.iter().join(",")));
        }

        let url = self.url(request.exchange);
        debug!(%url, mode = %request.mode, "fetching snapshot");

        let response = self.client.get(&url).query(&query).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(FetchError::NoData),
            status if !status.is_success() => return Err(FetchError::Status(status.as_u16())),
            _ => {}
        }

        let body = response.json::<Value>().await?;
        decode_snapshot(body)
    }
}

/// Decode a snapshot body: a JSON array of records, optionally wrapped as `{"data": [...]}`.
///
/// Records that fail to decode are skipped so one bad row never sinks the batch.
pub fn decode_snapshot(body: Value) -> Result<Vec<SymbolRecord>, FetchError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("data") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) => return Err(FetchError::NoData),
            _ => return Err(FetchError::Decode("expected a JSON array of records".to_string())),
        },
        Value::Null => return Err(FetchError::NoData),
        _ => return Err(FetchError::Decode("expected a JSON array of records".to_string())),
    };

    let records = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<SymbolRecord>(item) {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(index, %error, "skipping undecodable snapshot record");
                None
            }
        })
        .collect();

    Ok(records)
}
