//! Fixed-size grid used to identify revealed cells and pixels.
//!
//! A cell is a square of `CELL_SIZE_DEG` degrees (10 km of latitude). Its
//! canonical key is the south-west corner formatted as `"<lat>,<lng>"`, and
//! re-quantizing a key always yields the same key.

use std::fmt;
use std::str::FromStr;

pub const CELL_SIZE_DEG: f64 = 10.0 / 111.0;

const KEY_DECIMALS: usize = 6;
const KEY_SCALE: f64 = 1e6;
// limit / CELL_SIZE_DEG lands a hair above a whole number of cells.
const EDGE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lat: f64,
    pub lng: f64,
}

impl Point {
    /// Returns `None` unless both components are finite and inside
    /// `[-90, 90]` x `[-180, 180]`.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some(Point { lat, lng })
    }

    /// Parses `"lat,lng"`, tolerating whitespace around each component.
    pub fn parse_pair(s: &str) -> Option<Self> {
        let (lat, lng) = s.split_once(',')?;
        if lng.contains(',') {
            return None;
        }
        Point::new(lat.trim().parse().ok()?, lng.trim().parse().ok()?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridKey {
    lat_index: i64,
    lng_index: i64,
}

impl GridKey {
    pub fn from_point(point: Point) -> Self {
        GridKey {
            lat_index: index_for(point.lat, 90.0),
            lng_index: index_for(point.lng, 180.0),
        }
    }

    /// South-west corner of the cell.
    pub fn origin(&self) -> Point {
        Point {
            lat: self.lat_index as f64 * CELL_SIZE_DEG,
            lng: self.lng_index as f64 * CELL_SIZE_DEG,
        }
    }

    pub fn center(&self) -> Point {
        let origin = self.origin();
        Point {
            lat: origin.lat + CELL_SIZE_DEG / 2.0,
            lng: origin.lng + CELL_SIZE_DEG / 2.0,
        }
    }
}

/// Plain floor, except that a value which is exactly the six-decimal
/// rendering of a cell edge belongs to the cell starting at that edge.
fn index_for(value: f64, limit: f64) -> i64 {
    let max_index = ((limit / CELL_SIZE_DEG) - EDGE_EPSILON).ceil() as i64 - 1;
    let scaled = value / CELL_SIZE_DEG;
    let nearest = scaled.round();
    let index = if rendered_edge(nearest) == value {
        nearest
    } else {
        scaled.floor()
    };
    (index as i64).min(max_index)
}

fn rendered_edge(index: f64) -> f64 {
    (index * CELL_SIZE_DEG * KEY_SCALE).round() / KEY_SCALE
}

impl fmt::Display for GridKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = self.origin();
        write!(
            f,
            "{:.prec$},{:.prec$}",
            origin.lat,
            origin.lng,
            prec = KEY_DECIMALS
        )
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("not a valid \"lat,lng\" pair: {0}")]
pub struct ParseGridKeyError(String);

impl FromStr for GridKey {
    type Err = ParseGridKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Point::parse_pair(s)
            .map(GridKey::from_point)
            .ok_or_else(|| ParseGridKeyError(s.to_string()))
    }
}
