use geocoder::ClassifierConfig;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("max_batch_size must be at least 1")]
    EmptyBatchLimit,

    #[error("rate limit must allow at least one request in a non-empty window")]
    InvalidRateLimit,

    #[error("state.max_items must be at least 1")]
    EmptyStateLimit,

    #[error("presence window must be at least one second")]
    EmptyPresenceWindow,

    #[error("{0} timeline retention is shorter than the presence window")]
    RetentionTooShort(&'static str),

    #[error("upstash store requires a non-empty token")]
    EmptyStoreToken,

    #[error("timeout_ms cannot be 0")]
    ZeroTimeout,
}

/// Whether internal error details may be returned to clients.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn exposes_internal_errors(&self) -> bool {
        *self != Environment::Production
    }
}

/// How the global and per-country totals grow for accepted items.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TotalCounting {
    /// Only grid keys that were not stored before are counted.
    Distinct,
    /// Every accepted item is counted, including repeats.
    Accepted,
}

/// Lower bound applied to the online-player estimate.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PresenceFloor {
    /// 0 when the window holds no activity, otherwise at least 1.
    #[default]
    Zero,
    /// Never below 1.
    One,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    fn new(host: &str, port: u16) -> Self {
        Listener {
            host: host.into(),
            port,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

fn default_listener() -> Listener {
    Listener::new("127.0.0.1", 3000)
}

fn default_admin_listener() -> Listener {
    Listener::new("127.0.0.1", 3001)
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum StoreBackend {
    Memory,
    /// Redis-compatible REST endpoint.
    Upstash {
        url: Url,
        token: String,
        #[serde(default = "default_store_timeout_ms")]
        timeout_ms: u64,
    },
}

fn default_store_timeout_ms() -> u64 {
    5000
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(flatten)]
    pub backend: StoreBackend,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "fog".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            backend: StoreBackend::Memory,
            key_prefix: default_key_prefix(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            max_requests: 100,
            window_secs: 60,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Limits {
    pub max_batch_size: usize,
    pub rate_limit: RateLimitConfig,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_batch_size: 50,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Cell ingest behaviour. Pixels share the shape with different defaults.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CellsConfig {
    pub counting: TotalCounting,
    pub timeline_retention_secs: u64,
}

impl Default for CellsConfig {
    fn default() -> Self {
        CellsConfig {
            counting: TotalCounting::Distinct,
            timeline_retention_secs: 3600,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PixelsConfig {
    pub counting: TotalCounting,
    pub timeline_retention_secs: u64,
}

impl Default for PixelsConfig {
    fn default() -> Self {
        PixelsConfig {
            counting: TotalCounting::Accepted,
            timeline_retention_secs: 24 * 3600,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PresenceConfig {
    pub window_secs: u64,
    pub idle_floor: PresenceFloor,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        PresenceConfig {
            window_secs: 300,
            idle_floor: PresenceFloor::Zero,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct StateConfig {
    /// Maximum number of cells or pixels returned by a state read.
    pub max_items: usize,
    pub top_countries: usize,
    pub top_colors: usize,
    pub top_countries_per_color: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            max_items: 10_000,
            top_countries: 10,
            top_colors: 10,
            top_countries_per_color: 5,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_listener")]
    pub listener: Listener,
    #[serde(default = "default_admin_listener")]
    pub admin_listener: Listener,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub cells: CellsConfig,
    #[serde(default)]
    pub pixels: PixelsConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
    #[serde(default)]
    pub state: StateConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listener: default_listener(),
            admin_listener: default_admin_listener(),
            environment: Environment::default(),
            store: StoreConfig::default(),
            classifier: ClassifierConfig::default(),
            limits: Limits::default(),
            cells: CellsConfig::default(),
            pixels: PixelsConfig::default(),
            presence: PresenceConfig::default(),
            state: StateConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.limits.max_batch_size == 0 {
            return Err(ValidationError::EmptyBatchLimit);
        }

        let rate_limit = &self.limits.rate_limit;
        if rate_limit.max_requests == 0 || rate_limit.window_secs == 0 {
            return Err(ValidationError::InvalidRateLimit);
        }

        if self.state.max_items == 0 {
            return Err(ValidationError::EmptyStateLimit);
        }

        if self.presence.window_secs == 0 {
            return Err(ValidationError::EmptyPresenceWindow);
        }
        if self.cells.timeline_retention_secs < self.presence.window_secs {
            return Err(ValidationError::RetentionTooShort("cells"));
        }
        if self.pixels.timeline_retention_secs < self.presence.window_secs {
            return Err(ValidationError::RetentionTooShort("pixels"));
        }

        if let StoreBackend::Upstash {
            token, timeout_ms, ..
        } = &self.store.backend
        {
            if token.is_empty() {
                return Err(ValidationError::EmptyStoreToken);
            }
            if *timeout_ms == 0 {
                return Err(ValidationError::ZeroTimeout);
            }
        }

        if let Some(remote) = &self.classifier.remote
            && remote.timeout_ms == 0
        {
            return Err(ValidationError::ZeroTimeout);
        }

        Ok(())
    }
}
