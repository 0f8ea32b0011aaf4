use crate::transition::DEFAULT_TRANSITION_TTL;
use std::time::Duration;

/// Default quiet window used to coalesce push-event bursts.
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// Default delay before re-asking the secondary exchange for a snapshot it had no data for.
pub const DEFAULT_NO_DATA_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Board engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quiet window: only the last push event of a burst triggers a fetch
    pub debounce_window: Duration,
    /// How long a change transition stays visible
    pub transition_ttl: Duration,
    /// Delay before retrying a "no data yet" answer from the secondary exchange
    pub no_data_retry_delay: Duration,
    /// How many consecutive "no data yet" answers are retried before giving up
    pub no_data_retry_limit: u32,
    /// Symbols requested in watchlist mode
    pub watchlist: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            transition_ttl: DEFAULT_TRANSITION_TTL,
            no_data_retry_delay: DEFAULT_NO_DATA_RETRY_DELAY,
            no_data_retry_limit: 1,
            watchlist: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `BOARD_*` environment variables where set and parseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            debounce_window: env_millis("BOARD_DEBOUNCE_MS").unwrap_or(defaults.debounce_window),
            transition_ttl: env_millis("BOARD_TRANSITION_TTL_MS")
                .unwrap_or(defaults.transition_ttl),
            no_data_retry_delay: env_millis("BOARD_NO_DATA_RETRY_MS")
                .unwrap_or(defaults.no_data_retry_delay),
            no_data_retry_limit: std::env::var("BOARD_NO_DATA_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.no_data_retry_limit),
            watchlist: std::env::var("BOARD_WATCHLIST")
                .map(|s| parse_symbols(&s))
                .unwrap_or(defaults.watchlist),
        }
    }

    /// Set debounce window
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Set transition display duration
    pub fn with_transition_ttl(mut self, ttl: Duration) -> Self {
        self.transition_ttl = ttl;
        self
    }

    /// Set no-data retry delay
    pub fn with_no_data_retry_delay(mut self, delay: Duration) -> Self {
        self.no_data_retry_delay = delay;
        self
    }

    /// Set how many consecutive no-data answers are retried
    pub fn with_no_data_retry_limit(mut self, limit: u32) -> Self {
        self.no_data_retry_limit = limit;
        self
    }

    /// Set watchlist symbols
    pub fn with_watchlist<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.watchlist = symbols
            .into_iter()
            .map(|symbol| symbol.as_ref().trim().to_uppercase())
            .filter(|symbol| !symbol.is_empty())
            .collect();
        self
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_millis)
}

/// Split a comma-separated symbol list, e.g. `"vnm, FPT,,hpg"`.
pub fn parse_symbols(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.debounce_window, Duration::from_secs(1));
        assert_eq!(config.transition_ttl, Duration::from_secs(1));
        assert_eq!(config.no_data_retry_delay, Duration::from_secs(2));
        assert_eq!(config.no_data_retry_limit, 1);
        assert!(config.watchlist.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::default()
            .with_debounce_window(Duration::from_millis(250))
            .with_transition_ttl(Duration::from_millis(600))
            .with_no_data_retry_delay(Duration::from_secs(5))
            .with_no_data_retry_limit(3)
            .with_watchlist(["vnm", " fpt ", ""]);

        assert_eq!(config.debounce_window, Duration::from_millis(250));
        assert_eq!(config.transition_ttl, Duration::from_millis(600));
        assert_eq!(config.no_data_retry_delay, Duration::from_secs(5));
        assert_eq!(config.no_data_retry_limit, 3);
        assert_eq!(config.watchlist, vec!["VNM", "FPT"]);
    }

    #[test]
    fn test_parse_symbols() {
        assert_eq!(parse_symbols("vnm, FPT,,hpg"), vec!["VNM", "FPT", "HPG"]);
        assert!(parse_symbols("").is_empty());
    }
}
