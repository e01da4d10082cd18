//! Coarse coordinate-to-country attribution.
//!
//! Classification never fails: the remote classifier falls back to the local
//! heuristic, and the heuristic falls back to `CountryCode::UNKNOWN`.

pub mod config;
pub mod grid;
mod heuristic;
pub mod metrics_defs;
mod remote;
pub mod rules;
pub mod water;

use async_trait::async_trait;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

pub use config::{ClassifierConfig, RemoteConfig};
pub use grid::{GridKey, Point};
pub use heuristic::HeuristicClassifier;
pub use remote::RemoteClassifier;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CountryCode(Cow<'static, str>);

impl CountryCode {
    pub const UNKNOWN: CountryCode = CountryCode(Cow::Borrowed("XX"));

    pub const fn from_static(code: &'static str) -> Self {
        CountryCode(Cow::Borrowed(code))
    }

    /// Accepts two or three ASCII letters, upper-casing them. Anything else
    /// is treated as unknown.
    pub fn parse(code: &str) -> Self {
        let code = code.trim();
        let valid = (2..=3).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphabetic());
        if valid {
            CountryCode(Cow::Owned(code.to_ascii_uppercase()))
        } else {
            CountryCode::UNKNOWN
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        *self == CountryCode::UNKNOWN
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Country(CountryCode),
    /// Open water. Excluded from country attribution.
    Water,
}

impl Location {
    pub fn country(&self) -> Option<&CountryCode> {
        match self {
            Location::Country(code) => Some(code),
            Location::Water => None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ClassifierError {
    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("remote classifier returned status {0}")]
    Status(u16),

    #[error("remote classifier timed out after {0}ms")]
    Timeout(u64),
}

#[async_trait]
pub trait LocationClassifier: Send + Sync {
    async fn classify(&self, point: Point) -> Location;
}

/// Builds the classifier selected by `config`.
pub fn build_classifier(
    config: &ClassifierConfig,
) -> Result<Arc<dyn LocationClassifier>, ClassifierError> {
    let heuristic = HeuristicClassifier::new(config.water_filter);

    match &config.remote {
        Some(remote) => {
            tracing::info!(url = %remote.url, "using remote location classifier");
            Ok(Arc::new(RemoteClassifier::new(remote, heuristic)?))
        }
        None => Ok(Arc::new(heuristic)),
    }
}
