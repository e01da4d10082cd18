use serde::Deserialize;
use url::Url;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    /// Classify points inside the open-ocean boxes as water before
    /// consulting the country rules.
    #[serde(default)]
    pub water_filter: bool,
    /// Optional remote enrichment. The local heuristic is used when absent.
    pub remote: Option<RemoteConfig>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RemoteConfig {
    pub url: Url,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_cache_size")]
    pub cache_size: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_cache_size() -> u64 {
    10_000
}

fn default_cache_ttl_secs() -> u64 {
    3600
}
