//! Read side: the revealed set, pixel records and aggregated counters.

use crate::config::{Config, StateConfig};
use crate::errors::Result;
use crate::model::{BatchKind, PixelRecord};
use crate::presence::Presence;
use crate::store::{Keyspace, StateStore};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryShare {
    pub country: String,
    pub count: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorShare {
    pub color: String,
    pub count: i64,
    /// Share of each country's own pixels painted in this colour.
    pub top_countries: Vec<CountryShare>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellStats {
    pub total_cells: i64,
    pub online_players: u64,
    pub top_countries: Vec<CountryShare>,
    pub water: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellState {
    pub cells: Vec<String>,
    pub stats: CellStats,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixelEntry {
    pub key: String,
    #[serde(flatten)]
    pub record: PixelRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelStats {
    pub total_pixels: i64,
    pub online_players: u64,
    pub top_colors: Vec<ColorShare>,
    pub top_countries: Vec<CountryShare>,
    pub water: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixelState {
    pub pixels: Vec<PixelEntry>,
    pub stats: PixelStats,
    pub truncated: bool,
}

pub struct StateReader {
    store: Arc<dyn StateStore>,
    presence: Presence,
    limits: StateConfig,
    cells: Keyspace,
    pixels: Keyspace,
}

impl StateReader {
    pub fn new(config: &Config, store: Arc<dyn StateStore>) -> Self {
        let prefix = &config.store.key_prefix;
        StateReader {
            store,
            presence: Presence::new(
                Duration::from_secs(config.presence.window_secs),
                config.presence.idle_floor,
            ),
            limits: config.state.clone(),
            cells: Keyspace::new(prefix, BatchKind::Cells),
            pixels: Keyspace::new(prefix, BatchKind::Pixels),
        }
    }

    /// Keeps the `max_items` most recently revealed cells, oldest first.
    pub async fn cell_state(&self, now_ms: u64) -> Result<CellState> {
        let keys = &self.cells;
        let store = self.store.as_ref();

        let (members, reveal_order, total_cells, countries, water) = tokio::try_join!(
            store.set_members(&keys.records),
            store.sorted_range_by_score(&keys.reveal_order, 0, u64::MAX),
            store.get_counter(&keys.total),
            store.hash_get_all(&keys.countries),
            store.get_counter(&keys.water),
        )?;
        let online_players = self
            .presence
            .observe(store, BatchKind::Cells, &keys.timeline, now_ms)
            .await;

        let (cells, truncated) = newest_cells(members, reveal_order, self.limits.max_items);

        Ok(CellState {
            cells,
            stats: CellStats {
                total_cells,
                online_players,
                top_countries: top_countries(&parse_counts(countries), self.limits.top_countries),
                water,
            },
            truncated,
        })
    }

    /// Keeps the `max_items` most recently placed pixels, newest first.
    pub async fn pixel_state(&self, now_ms: u64) -> Result<PixelState> {
        let keys = &self.pixels;
        let store = self.store.as_ref();

        let (records, total_pixels, countries, colors, country_colors, water) = tokio::try_join!(
            store.hash_get_all(&keys.records),
            store.get_counter(&keys.total),
            store.hash_get_all(&keys.countries),
            store.hash_get_all(&keys.colors),
            store.hash_get_all(&keys.country_colors),
            store.get_counter(&keys.water),
        )?;
        let online_players = self
            .presence
            .observe(store, BatchKind::Pixels, &keys.timeline, now_ms)
            .await;

        let mut pixels: Vec<PixelEntry> = records
            .into_iter()
            .filter_map(|(key, raw)| match serde_json::from_str(&raw) {
                Ok(record) => Some(PixelEntry { key, record }),
                Err(err) => {
                    tracing::warn!(error = %err, key, "skipping malformed pixel record");
                    None
                }
            })
            .collect();
        pixels.sort_by(|a, b| b.record.timestamp.cmp(&a.record.timestamp));
        let truncated = pixels.len() > self.limits.max_items;
        pixels.truncate(self.limits.max_items);

        let countries = parse_counts(countries);
        let top_colors = top_colors(
            &parse_counts(colors),
            &parse_counts(country_colors),
            &countries,
            &self.limits,
        );

        Ok(PixelState {
            pixels,
            stats: PixelStats {
                total_pixels,
                online_players,
                top_colors,
                top_countries: top_countries(&countries, self.limits.top_countries),
                water,
            },
            truncated,
        })
    }
}

/// Orders cells by first reveal time, ties by key. Members with no recorded
/// reveal time sort before all others.
fn newest_cells(members: Vec<String>, reveal_order: Vec<String>, limit: usize) -> (Vec<String>, bool) {
    let mut unscored: HashSet<String> = members.into_iter().collect();
    let scored: Vec<String> = reveal_order
        .into_iter()
        .filter(|key| unscored.remove(key))
        .collect();

    let mut cells: Vec<String> = unscored.into_iter().collect();
    cells.sort();
    cells.extend(scored);

    let truncated = cells.len() > limit;
    if truncated {
        cells.drain(..cells.len() - limit);
    }
    (cells, truncated)
}

fn parse_counts(fields: Vec<(String, String)>) -> HashMap<String, i64> {
    fields
        .into_iter()
        .filter_map(|(field, raw)| match raw.parse::<i64>() {
            Ok(count) => Some((field, count)),
            Err(_) => {
                tracing::warn!(field, raw, "skipping non-numeric counter");
                None
            }
        })
        .collect()
}

fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / whole as f64).round() / 10.0
}

/// Highest counts first, ties broken by name.
fn ranked(counts: impl IntoIterator<Item = (String, i64)>, limit: usize) -> Vec<(String, i64)> {
    let mut ranked: Vec<(String, i64)> = counts.into_iter().filter(|(_, n)| *n > 0).collect();
    ranked.sort_by(|(a_name, a), (b_name, b)| b.cmp(a).then_with(|| a_name.cmp(b_name)));
    ranked.truncate(limit);
    ranked
}

fn top_countries(countries: &HashMap<String, i64>, limit: usize) -> Vec<CountryShare> {
    let sum: i64 = countries.values().filter(|n| **n > 0).sum();
    ranked(countries.iter().map(|(c, n)| (c.clone(), *n)), limit)
        .into_iter()
        .map(|(country, count)| CountryShare {
            percentage: percentage(count, sum),
            country,
            count,
        })
        .collect()
}

/// `country_colors` fields are `<country>:<color>`.
fn top_colors(
    colors: &HashMap<String, i64>,
    country_colors: &HashMap<String, i64>,
    countries: &HashMap<String, i64>,
    limits: &StateConfig,
) -> Vec<ColorShare> {
    let mut by_color: HashMap<&str, Vec<(String, i64)>> = HashMap::new();
    for (field, count) in country_colors {
        if let Some((country, color)) = field.split_once(':') {
            by_color
                .entry(color)
                .or_default()
                .push((country.to_string(), *count));
        }
    }

    ranked(colors.iter().map(|(c, n)| (c.clone(), *n)), limits.top_colors)
        .into_iter()
        .map(|(color, count)| {
            let per_country = by_color.remove(color.as_str()).unwrap_or_default();
            let top_countries = ranked(per_country, limits.top_countries_per_color)
                .into_iter()
                .map(|(country, count)| CountryShare {
                    percentage: percentage(count, countries.get(&country).copied().unwrap_or(0)),
                    country,
                    count,
                })
                .collect();
            ColorShare {
                color,
                count,
                top_countries,
            }
        })
        .collect()
}
