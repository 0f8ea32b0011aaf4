use std::collections::HashSet;

/// Feature gating entry into watchlist mode.
pub const WATCHLIST_FEATURE: &str = "watchlist";

/// External capability check (subscription tier, account flags, ...).
pub trait CapabilityCheck: Send + Sync {
    fn has_feature(&self, feature: &str) -> bool;
}

/// Fixed feature set, e.g. parsed from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticCapabilities {
    features: HashSet<String>,
}

impl StaticCapabilities {
    pub fn new<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            features: features
                .into_iter()
                .map(|feature| feature.into().trim().to_lowercase())
                .filter(|feature| !feature.is_empty())
                .collect(),
        }
    }

    /// Every feature granted.
    pub fn all() -> Self {
        Self::new([WATCHLIST_FEATURE])
    }

    /// No features granted.
    pub fn none() -> Self {
        Self::default()
    }
}

impl CapabilityCheck for StaticCapabilities {
    fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(&feature.to_lowercase())
    }
}
