//! Batch ingest: validate, rate check, classify, persist, prune, respond.
//!
//! Cells and pixels share one pipeline. Items are deduplicated per grid key
//! (last one wins), each distinct key gets one classification and one
//! membership or record write, and those writes run concurrently. Counters
//! and the timeline are updated once per batch from the aggregated results.

use crate::config::{Config, TotalCounting};
use crate::errors::{IngestError, Result};
use crate::metrics_defs::{
    BATCH_RECEIVED, BATCH_REJECTED, INGEST_DURATION, ITEMS_PROCESSED, ITEMS_REJECTED,
    RATE_LIMITED, STORE_ERRORS,
};
use crate::model::{BatchKind, Color, PixelRecord, PlayerId};
use crate::presence::{self, Presence};
use crate::rate_limit::{RateLimitDecision, RateLimiter};
use crate::store::{Keyspace, StateStore, StoreError};
use crate::validate::{self, Partition};
use geocoder::{GridKey, Location, LocationClassifier, Point};
use indexmap::IndexMap;
use serde_json::Value;
use shared::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

const WATER: &str = "water";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestOutcome {
    pub processed: usize,
    pub rejected: usize,
    pub total: i64,
    pub online_players: u64,
}

pub(crate) struct KindSettings {
    pub(crate) kind: BatchKind,
    pub(crate) keys: Keyspace,
    counting: TotalCounting,
    retention_ms: u64,
}

impl KindSettings {
    fn new(prefix: &str, kind: BatchKind, counting: TotalCounting, retention_secs: u64) -> Self {
        KindSettings {
            kind,
            keys: Keyspace::new(prefix, kind),
            counting,
            retention_ms: retention_secs.saturating_mul(1000),
        }
    }

    fn counted(&self, written: &Written) -> i64 {
        match self.counting {
            TotalCounting::Distinct => i64::from(written.created),
            TotalCounting::Accepted => written.write.weight,
        }
    }
}

/// One store write. `weight` is the number of batch items collapsed into it.
struct Write {
    key: GridKey,
    point: Point,
    weight: i64,
    pixel: Option<PixelWrite>,
}

struct PixelWrite {
    color: Color,
    record: String,
}

struct Written {
    write: Write,
    location: Location,
    created: bool,
}

struct Batch {
    player: PlayerId,
    writes: Vec<Write>,
    processed: usize,
    rejected: usize,
}

#[derive(Default)]
struct Tally {
    total: i64,
    water: i64,
    countries: HashMap<String, i64>,
    colors: HashMap<String, i64>,
    country_colors: HashMap<String, i64>,
    timeline: Vec<(u64, String)>,
    /// Cells seen for the first time, scored by reveal time.
    revealed: Vec<(u64, String)>,
}

impl Tally {
    fn new(settings: &KindSettings, written: &[Written], player: &PlayerId, now_ms: u64) -> Self {
        let mut tally = Tally::default();

        for item in written {
            let country = item
                .location
                .country()
                .map_or_else(|| WATER.to_string(), ToString::to_string);
            let entry = match &item.write.pixel {
                Some(pixel) => presence::pixel_entry(&item.write.key, player, &pixel.color, &country),
                None => presence::cell_entry(&item.write.key, player),
            };
            tally.timeline.push((now_ms, entry));
            if item.write.pixel.is_none() && item.created {
                tally.revealed.push((now_ms, item.write.key.to_string()));
            }

            let weight = settings.counted(item);
            if weight == 0 {
                continue;
            }
            tally.total += weight;

            if let Some(pixel) = &item.write.pixel {
                *tally.colors.entry(pixel.color.to_string()).or_default() += weight;
            }
            match item.location.country() {
                None => tally.water += weight,
                Some(code) => {
                    *tally.countries.entry(code.to_string()).or_default() += weight;
                    if let Some(pixel) = &item.write.pixel {
                        *tally
                            .country_colors
                            .entry(format!("{}:{}", code, pixel.color))
                            .or_default() += weight;
                    }
                }
            }
        }

        tally
    }
}

fn dedupe(writes: impl IntoIterator<Item = Write>) -> Vec<Write> {
    let mut by_key: IndexMap<GridKey, Write> = IndexMap::new();
    for mut write in writes {
        if let Some(previous) = by_key.get(&write.key) {
            write.weight += previous.weight;
        }
        by_key.insert(write.key, write);
    }
    by_key.into_values().collect()
}

fn player_id(body: &Value) -> PlayerId {
    PlayerId::normalize(body.get("playerId").and_then(Value::as_str))
}

pub struct Ingestor {
    store: Arc<dyn StateStore>,
    classifier: Arc<dyn LocationClassifier>,
    limiter: RateLimiter,
    presence: Presence,
    max_batch_size: usize,
    cells: KindSettings,
    pixels: KindSettings,
}

impl Ingestor {
    pub fn new(
        config: &Config,
        store: Arc<dyn StateStore>,
        classifier: Arc<dyn LocationClassifier>,
    ) -> Self {
        let prefix = &config.store.key_prefix;
        let rate_limit = &config.limits.rate_limit;

        Ingestor {
            store,
            classifier,
            limiter: RateLimiter::new(
                rate_limit.max_requests,
                Duration::from_secs(rate_limit.window_secs),
            ),
            presence: Presence::new(
                Duration::from_secs(config.presence.window_secs),
                config.presence.idle_floor,
            ),
            max_batch_size: config.limits.max_batch_size,
            cells: KindSettings::new(
                prefix,
                BatchKind::Cells,
                config.cells.counting,
                config.cells.timeline_retention_secs,
            ),
            pixels: KindSettings::new(
                prefix,
                BatchKind::Pixels,
                config.pixels.counting,
                config.pixels.timeline_retention_secs,
            ),
        }
    }

    /// Body: `{"cells": [...], "playerId"?: "..."}`.
    pub async fn reveal_cells(&self, client: &str, body: &Value, now_ms: u64) -> Result<IngestOutcome> {
        let started = Instant::now();
        let settings = &self.cells;
        let partition = self.admit(
            settings,
            client,
            now_ms,
            validate::cells(body, self.max_batch_size),
        )?;

        let writes = partition.accepted.iter().map(|item| Write {
            key: item.key,
            point: item.point,
            weight: 1,
            pixel: None,
        });
        let batch = Batch {
            player: player_id(body),
            writes: dedupe(writes),
            processed: partition.accepted.len(),
            rejected: partition.rejected.len(),
        };

        self.persist(settings, client, batch, now_ms, started).await
    }

    /// Body: `{"pixels": [{"position", "color", "opacity"?}], "playerId"?: "..."}`.
    pub async fn place_pixels(&self, client: &str, body: &Value, now_ms: u64) -> Result<IngestOutcome> {
        let started = Instant::now();
        let settings = &self.pixels;
        let partition = self.admit(
            settings,
            client,
            now_ms,
            validate::pixels(body, self.max_batch_size),
        )?;
        let player = player_id(body);

        let mut writes = Vec::with_capacity(partition.accepted.len());
        for item in &partition.accepted {
            let record = PixelRecord {
                color: item.color.clone(),
                opacity: item.opacity,
                player_id: player.clone(),
                timestamp: now_ms,
            };
            let record = serde_json::to_string(&record)
                .map_err(|err| IngestError::Internal(err.to_string()))?;
            writes.push(Write {
                key: item.key,
                point: item.point,
                weight: 1,
                pixel: Some(PixelWrite {
                    color: item.color.clone(),
                    record,
                }),
            });
        }

        let batch = Batch {
            player,
            writes: dedupe(writes),
            processed: partition.accepted.len(),
            rejected: partition.rejected.len(),
        };

        self.persist(settings, client, batch, now_ms, started).await
    }

    /// Validation runs first, so malformed requests never use up the quota.
    fn admit<T>(
        &self,
        settings: &KindSettings,
        client: &str,
        now_ms: u64,
        validated: Result<Partition<T>>,
    ) -> Result<Partition<T>> {
        let kind = settings.kind.as_str();
        counter!(BATCH_RECEIVED, "kind" => kind).increment(1);

        let partition = validated.inspect_err(|err| {
            counter!(BATCH_REJECTED, "kind" => kind, "reason" => err.code()).increment(1);
        })?;

        if let RateLimitDecision::Rejected { retry_after_secs } = self.limiter.check(client, now_ms) {
            counter!(RATE_LIMITED).increment(1);
            counter!(BATCH_REJECTED, "kind" => kind, "reason" => "rate_limited").increment(1);
            tracing::info!(client, kind, retry_after_secs, "rate limited batch");
            return Err(IngestError::RateLimited { retry_after_secs });
        }

        Ok(partition)
    }

    async fn persist(
        &self,
        settings: &KindSettings,
        client: &str,
        batch: Batch,
        now_ms: u64,
        started: Instant,
    ) -> Result<IngestOutcome> {
        let kind = settings.kind.as_str();
        let (written, write_error) = self.write_items(settings, batch.writes).await;

        let tally = Tally::new(settings, &written, &batch.player, now_ms);
        let (total, (), timeline, revealed) = tokio::join!(
            self.update_total(settings, tally.total),
            self.apply_breakdowns(&settings.keys, &tally),
            self.store.sorted_add(&settings.keys.timeline, &tally.timeline),
            self.record_reveal_order(&settings.keys, &tally.revealed),
        );
        if let Err(err) = timeline {
            counter!(STORE_ERRORS, "op" => "timeline").increment(1);
            tracing::warn!(error = %err, kind, "failed to append timeline entries");
        }
        if let Err(err) = revealed {
            counter!(STORE_ERRORS, "op" => "reveal_order").increment(1);
            tracing::warn!(error = %err, kind, "failed to record reveal order");
        }

        if let Some(err) = write_error {
            counter!(BATCH_REJECTED, "kind" => kind, "reason" => err.code()).increment(1);
            return Err(err);
        }

        self.prune(settings, now_ms).await;
        let online_players = self.online_players(settings, now_ms).await;

        counter!(ITEMS_PROCESSED, "kind" => kind).increment(batch.processed as u64);
        counter!(ITEMS_REJECTED, "kind" => kind).increment(batch.rejected as u64);
        histogram!(INGEST_DURATION, "kind" => kind).record(started.elapsed().as_secs_f64());
        tracing::info!(
            kind,
            client,
            processed = batch.processed,
            rejected = batch.rejected,
            total,
            online_players,
            duration_ms = started.elapsed().as_millis() as u64,
            "ingested batch"
        );

        Ok(IngestOutcome {
            processed: batch.processed,
            rejected: batch.rejected,
            total,
            online_players,
        })
    }

    /// Every write is attempted. The first failure is returned alongside the
    /// writes that went through.
    async fn write_items(
        &self,
        settings: &KindSettings,
        writes: Vec<Write>,
    ) -> (Vec<Written>, Option<IngestError>) {
        let mut tasks = JoinSet::new();
        for write in writes {
            let store = Arc::clone(&self.store);
            let classifier = Arc::clone(&self.classifier);
            let records = settings.keys.records.clone();

            tasks.spawn(async move {
                let location = classifier.classify(write.point).await;
                let field = write.key.to_string();
                let created = match &write.pixel {
                    Some(pixel) => store.hash_set(&records, &field, &pixel.record).await,
                    None => store.set_add(&records, &field).await,
                };
                (write, location, created)
            });
        }

        let kind = settings.kind.as_str();
        let mut written = Vec::with_capacity(tasks.len());
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((write, location, Ok(created))) => written.push(Written {
                    write,
                    location,
                    created,
                }),
                Ok((write, _, Err(err))) => {
                    counter!(STORE_ERRORS, "op" => "write").increment(1);
                    tracing::error!(error = %err, key = %write.key, kind, "failed to persist item");
                    first_error.get_or_insert(IngestError::Store(err));
                }
                Err(err) => {
                    tracing::error!(error = %err, kind, "item write task failed");
                    first_error.get_or_insert(IngestError::Internal(err.to_string()));
                }
            }
        }

        (written, first_error)
    }

    /// Falls back to reading the counter, then to zero.
    async fn update_total(&self, settings: &KindSettings, delta: i64) -> i64 {
        let key = &settings.keys.total;
        if delta > 0 {
            match self.store.incr_by(key, delta).await {
                Ok(total) => return total,
                Err(err) => {
                    counter!(STORE_ERRORS, "op" => "total").increment(1);
                    tracing::warn!(error = %err, key, "failed to increment total");
                }
            }
        }

        self.store.get_counter(key).await.unwrap_or_else(|err| {
            counter!(STORE_ERRORS, "op" => "total").increment(1);
            tracing::warn!(error = %err, key, "failed to read total");
            0
        })
    }

    async fn apply_breakdowns(&self, keys: &Keyspace, tally: &Tally) {
        let mut tasks = JoinSet::new();

        let breakdowns = [
            (&keys.countries, &tally.countries),
            (&keys.colors, &tally.colors),
            (&keys.country_colors, &tally.country_colors),
        ];
        for (hash, fields) in breakdowns {
            for (field, delta) in fields {
                let store = Arc::clone(&self.store);
                let (hash, field, delta) = (hash.clone(), field.clone(), *delta);
                tasks.spawn(async move {
                    let result = store.hash_incr_by(&hash, &field, delta).await;
                    (format!("{hash}/{field}"), result)
                });
            }
        }

        if tally.water > 0 {
            let store = Arc::clone(&self.store);
            let (key, delta) = (keys.water.clone(), tally.water);
            tasks.spawn(async move {
                let result = store.incr_by(&key, delta).await;
                (key, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => {}
                Ok((field, Err(err))) => {
                    counter!(STORE_ERRORS, "op" => "breakdown").increment(1);
                    tracing::warn!(error = %err, field, "failed to increment counter");
                }
                Err(err) => tracing::warn!(error = %err, "counter task failed"),
            }
        }
    }

    /// Only new members are scored, so a cell keeps its first reveal time.
    async fn record_reveal_order(
        &self,
        keys: &Keyspace,
        revealed: &[(u64, String)],
    ) -> Result<(), StoreError> {
        if revealed.is_empty() {
            return Ok(());
        }
        self.store.sorted_add(&keys.reveal_order, revealed).await
    }

    async fn prune(&self, settings: &KindSettings, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(settings.retention_ms);
        match self
            .store
            .remove_scored_below(&settings.keys.timeline, cutoff)
            .await
        {
            Ok(removed) if removed > 0 => {
                tracing::debug!(kind = settings.kind.as_str(), removed, "pruned timeline");
            }
            Ok(_) => {}
            Err(err) => {
                counter!(STORE_ERRORS, "op" => "prune").increment(1);
                tracing::warn!(error = %err, kind = settings.kind.as_str(), "failed to prune timeline");
            }
        }
    }

    pub(crate) async fn online_players(&self, settings: &KindSettings, now_ms: u64) -> u64 {
        self.presence
            .observe(
                self.store.as_ref(),
                settings.kind,
                &settings.keys.timeline,
                now_ms,
            )
            .await
    }
}
