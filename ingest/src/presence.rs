//! Online player estimate over the activity timeline.
//!
//! Timeline members are `<gridKey>:<playerId>` for cells and
//! `<gridKey>:<playerId>:<color>:<country>` for pixels. Grid keys and
//! normalised player ids never contain `:`.

use crate::config::PresenceFloor;
use crate::metrics_defs::{ONLINE_PLAYERS, STORE_ERRORS};
use crate::model::{BatchKind, Color, PlayerId};
use crate::store::{StateStore, StoreError};
use geocoder::GridKey;
use shared::{counter, gauge};
use std::collections::HashSet;
use std::time::Duration;

pub fn cell_entry(key: &GridKey, player: &PlayerId) -> String {
    format!("{key}:{player}")
}

pub fn pixel_entry(key: &GridKey, player: &PlayerId, color: &Color, country: &str) -> String {
    format!("{key}:{player}:{color}:{country}")
}

pub fn player_of(entry: &str) -> Option<&str> {
    entry.split(':').nth(1).filter(|player| !player.is_empty())
}

#[derive(Debug, Clone, Copy)]
pub struct Presence {
    window_ms: u64,
    floor: PresenceFloor,
}

impl Presence {
    pub fn new(window: Duration, floor: PresenceFloor) -> Self {
        Presence {
            window_ms: window.as_millis() as u64,
            floor,
        }
    }

    /// Distinct players among `entries`, after the idle floor.
    pub fn estimate<S: AsRef<str>>(&self, entries: &[S]) -> u64 {
        let players: HashSet<&str> = entries
            .iter()
            .filter_map(|entry| player_of(entry.as_ref()))
            .collect();
        let distinct = players.len() as u64;

        match self.floor {
            PresenceFloor::Zero if entries.is_empty() => 0,
            _ => distinct.max(1),
        }
    }

    pub async fn online_players(
        &self,
        store: &dyn StateStore,
        timeline_key: &str,
        now_ms: u64,
    ) -> Result<u64, StoreError> {
        let since = now_ms.saturating_sub(self.window_ms);
        let entries = store
            .sorted_range_by_score(timeline_key, since, now_ms)
            .await?;
        Ok(self.estimate(&entries))
    }

    /// Reports zero when the timeline cannot be read.
    pub async fn observe(
        &self,
        store: &dyn StateStore,
        kind: BatchKind,
        timeline_key: &str,
        now_ms: u64,
    ) -> u64 {
        let kind = kind.as_str();
        let online = self
            .online_players(store, timeline_key, now_ms)
            .await
            .unwrap_or_else(|err| {
                counter!(STORE_ERRORS, "op" => "presence").increment(1);
                tracing::warn!(error = %err, kind, "failed to read timeline");
                0
            });
        gauge!(ONLINE_PLAYERS, "kind" => kind).set(online as f64);
        online
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use geocoder::Point;

    const NOW: u64 = 1_700_000_000_000;

    fn key(lat: f64, lng: f64) -> GridKey {
        GridKey::from_point(Point::new(lat, lng).unwrap())
    }

    fn presence(floor: PresenceFloor) -> Presence {
        Presence::new(Duration::from_secs(300), floor)
    }

    #[test]
    fn test_entry_encoding() {
        let player = PlayerId::normalize(Some("p1"));
        let color = Color::parse("#ff0000").unwrap();
        let cell = key(55.75, 37.62);

        let entry = cell_entry(&cell, &player);
        assert_eq!(entry, format!("{cell}:p1"));
        assert_eq!(player_of(&entry), Some("p1"));

        let entry = pixel_entry(&cell, &player, &color, "RU");
        assert!(entry.ends_with(":p1:#ff0000:RU"));
        assert_eq!(player_of(&entry), Some("p1"));

        assert_eq!(player_of("no-player"), None);
    }

    #[test]
    fn test_floor_policies() {
        let empty: [&str; 0] = [];
        assert_eq!(presence(PresenceFloor::Zero).estimate(&empty), 0);
        assert_eq!(presence(PresenceFloor::One).estimate(&empty), 1);

        let malformed = ["garbage"];
        assert_eq!(presence(PresenceFloor::Zero).estimate(&malformed), 1);
    }

    #[tokio::test]
    async fn test_three_entries_two_players() {
        let store = MemoryStore::new();
        let p1 = PlayerId::normalize(Some("p1"));
        let p2 = PlayerId::normalize(Some("p2"));
        let entries = vec![
            (NOW - 60_000, cell_entry(&key(1.0, 1.0), &p1)),
            (NOW - 30_000, cell_entry(&key(2.0, 2.0), &p1)),
            (NOW - 10_000, cell_entry(&key(3.0, 3.0), &p2)),
            // Outside the window.
            (NOW - 600_000, cell_entry(&key(4.0, 4.0), &PlayerId::normalize(Some("p3")))),
        ];
        store.sorted_add("timeline", &entries).await.unwrap();

        let online = presence(PresenceFloor::Zero)
            .online_players(&store, "timeline", NOW)
            .await
            .unwrap();
        assert_eq!(online, 2);
    }

    #[tokio::test]
    async fn test_idle_timeline() {
        let store = MemoryStore::new();
        let online = presence(PresenceFloor::Zero)
            .online_players(&store, "timeline", NOW)
            .await
            .unwrap();
        assert_eq!(online, 0);
    }
}
