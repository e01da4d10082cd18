use crate::config::RemoteConfig;
use crate::grid::{GridKey, Point};
use crate::metrics_defs::{REMOTE_CACHE_HIT, REMOTE_CACHE_MISS, REMOTE_DURATION, REMOTE_FALLBACK};
use crate::{ClassifierError, CountryCode, HeuristicClassifier, Location, LocationClassifier};
use async_trait::async_trait;
use moka::sync::Cache;
use serde::Deserialize;
use shared::{counter, histogram};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use url::Url;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteAnswer {
    country_code: Option<String>,
    #[serde(default)]
    water: bool,
}

impl From<RemoteAnswer> for Location {
    fn from(answer: RemoteAnswer) -> Self {
        if answer.water {
            return Location::Water;
        }
        let code = answer
            .country_code
            .as_deref()
            .map(CountryCode::parse)
            .unwrap_or(CountryCode::UNKNOWN);
        Location::Country(code)
    }
}

impl ClassifierError {
    fn reason(&self) -> &'static str {
        match self {
            ClassifierError::Client(_) => "client",
            ClassifierError::Status(_) => "status",
            ClassifierError::Timeout(_) => "timeout",
        }
    }
}

/// Asks an external geocoding service for the country of each grid cell.
///
/// Answers are cached per grid cell. A slow or failing service never blocks a
/// batch for longer than the configured timeout: the local heuristic answers
/// instead, and that answer is not cached so the service is retried later.
pub struct RemoteClassifier {
    client: reqwest::Client,
    url: Url,
    timeout_ms: u64,
    cache: Cache<GridKey, Location>,
    fallback: HeuristicClassifier,
}

impl RemoteClassifier {
    pub fn new(
        config: &RemoteConfig,
        fallback: HeuristicClassifier,
    ) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(config.cache_size)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();

        Ok(RemoteClassifier {
            client,
            url: config.url.clone(),
            timeout_ms: config.timeout_ms,
            cache,
            fallback,
        })
    }

    async fn fetch(&self, point: Point) -> Result<Location, ClassifierError> {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("lat", &point.lat.to_string())
            .append_pair("lng", &point.lng.to_string());

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ClassifierError::Status(response.status().as_u16()));
        }

        let answer = response.json::<RemoteAnswer>().await?;
        Ok(answer.into())
    }
}

#[async_trait]
impl LocationClassifier for RemoteClassifier {
    async fn classify(&self, point: Point) -> Location {
        if self.fallback.is_water(point) {
            return Location::Water;
        }

        let key = GridKey::from_point(point);
        if let Some(location) = self.cache.get(&key) {
            counter!(REMOTE_CACHE_HIT).increment(1);
            return location;
        }
        counter!(REMOTE_CACHE_MISS).increment(1);

        let started = Instant::now();
        let result = timeout(Duration::from_millis(self.timeout_ms), self.fetch(key.center()))
            .await
            .unwrap_or(Err(ClassifierError::Timeout(self.timeout_ms)));
        histogram!(REMOTE_DURATION).record(started.elapsed().as_secs_f64());

        match result {
            Ok(location) => {
                self.cache.insert(key, location.clone());
                location
            }
            Err(err) => {
                tracing::warn!(error = %err, %key, "remote classification failed, using local heuristic");
                counter!(REMOTE_FALLBACK, "reason" => err.reason()).increment(1);
                self.fallback.locate(point)
            }
        }
    }
}
