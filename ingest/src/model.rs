use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_PLAYER_ID_LEN: usize = 64;
pub const ANONYMOUS_PLAYER: &str = "anonymous";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchKind {
    Cells,
    Pixels,
}

impl BatchKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BatchKind::Cells => "cells",
            BatchKind::Pixels => "pixels",
        }
    }
}

/// Player identifier embedded in timeline entries.
///
/// Colons separate the components of a timeline entry, so they never appear
/// in a normalised id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn normalize(raw: Option<&str>) -> Self {
        let trimmed = raw.map(str::trim).unwrap_or_default();
        if trimmed.is_empty() {
            return PlayerId(ANONYMOUS_PLAYER.into());
        }
        let id = trimmed
            .chars()
            .take(MAX_PLAYER_ID_LEN)
            .map(|c| if c == ':' { '_' } else { c })
            .collect();
        PlayerId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase `#rrggbb` colour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    /// Accepts `#rgb` or `#rrggbb` in any case.
    pub fn parse(raw: &str) -> Option<Self> {
        let hex = raw.trim().strip_prefix('#')?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let expanded = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect::<String>(),
            6 => hex.to_string(),
            _ => return None,
        };
        Some(Color(format!("#{}", expanded.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value stored per grid key in the pixel hash. Last write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelRecord {
    pub color: Color,
    pub opacity: f64,
    pub player_id: PlayerId,
    /// Epoch milliseconds of the placement.
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_normalization() {
        assert_eq!(PlayerId::normalize(None).as_str(), ANONYMOUS_PLAYER);
        assert_eq!(PlayerId::normalize(Some("   ")).as_str(), ANONYMOUS_PLAYER);
        assert_eq!(PlayerId::normalize(Some(" p1 ")).as_str(), "p1");
        assert_eq!(PlayerId::normalize(Some("a:b:c")).as_str(), "a_b_c");

        let long = "x".repeat(200);
        assert_eq!(PlayerId::normalize(Some(&long)).as_str().len(), 64);
    }

    #[test]
    fn test_color_parse() {
        assert_eq!(Color::parse("#FF0000").unwrap().as_str(), "#ff0000");
        assert_eq!(Color::parse("#0f8").unwrap().as_str(), "#00ff88");
        assert_eq!(Color::parse(" #abcdef ").unwrap().as_str(), "#abcdef");
        assert!(Color::parse("ff0000").is_none());
        assert!(Color::parse("#ff00").is_none());
        assert!(Color::parse("#gg0000").is_none());
        assert!(Color::parse("red").is_none());
    }

    #[test]
    fn test_pixel_record_json_shape() {
        let record = PixelRecord {
            color: Color::parse("#123456").unwrap(),
            opacity: 0.5,
            player_id: PlayerId::normalize(Some("p1")),
            timestamp: 1_700_000_000_000,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "color": "#123456",
                "opacity": 0.5,
                "playerId": "p1",
                "timestamp": 1_700_000_000_000u64,
            })
        );
        let decoded: PixelRecord = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, record);
    }
}
