//! Batch shape checks and per-item filtering.
//!
//! Problems with the batch as a whole reject the request. Problems with a
//! single item only drop that item.

use crate::errors::IngestError;
use crate::model::Color;
use geocoder::{GridKey, Point};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchError {
    #[error("request body is not valid JSON")]
    InvalidJson,

    #[error("missing `{0}` field")]
    Missing(&'static str),

    #[error("`{0}` must be an array")]
    NotAList(&'static str),

    #[error("batch is empty")]
    Empty,

    #[error("batch exceeds the maximum of {max} items")]
    TooLarge { max: usize },
}

impl BatchError {
    pub const fn code(&self) -> &'static str {
        match self {
            BatchError::InvalidJson => "invalid_json",
            BatchError::Missing(_) => "missing_batch",
            BatchError::NotAList(_) => "batch_not_list",
            BatchError::Empty => "empty_batch",
            BatchError::TooLarge { .. } => "batch_too_large",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partition<T> {
    pub accepted: Vec<T>,
    pub rejected: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellItem {
    pub point: Point,
    pub key: GridKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PixelItem {
    pub point: Point,
    pub key: GridKey,
    pub color: Color,
    pub opacity: f64,
}

pub fn cells(body: &Value, max_batch_size: usize) -> Result<Partition<CellItem>, IngestError> {
    partition(batch_items(body, "cells", max_batch_size)?, cell_item)
}

pub fn pixels(body: &Value, max_batch_size: usize) -> Result<Partition<PixelItem>, IngestError> {
    partition(batch_items(body, "pixels", max_batch_size)?, pixel_item)
}

fn batch_items<'a>(
    body: &'a Value,
    field: &'static str,
    max_batch_size: usize,
) -> Result<&'a [Value], IngestError> {
    let items = body
        .get(field)
        .filter(|value| !value.is_null())
        .ok_or(BatchError::Missing(field))?
        .as_array()
        .ok_or(BatchError::NotAList(field))?;

    if items.is_empty() {
        return Err(BatchError::Empty.into());
    }
    if items.len() > max_batch_size {
        return Err(BatchError::TooLarge {
            max: max_batch_size,
        }
        .into());
    }
    Ok(items)
}

fn partition<T>(
    items: &[Value],
    parse: impl Fn(&Value) -> Option<T>,
) -> Result<Partition<T>, IngestError> {
    let mut accepted = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();

    for item in items {
        match parse(item) {
            Some(parsed) => accepted.push(parsed),
            None => rejected.push(item.clone()),
        }
    }

    if accepted.is_empty() {
        return Err(IngestError::NoValidItems);
    }
    Ok(Partition { accepted, rejected })
}

/// A position is either `"lat,lng"` or a two element array of numbers or
/// numeric strings.
pub fn parse_position(value: &Value) -> Option<Point> {
    match value {
        Value::String(pair) => Point::parse_pair(pair),
        Value::Array(components) => match components.as_slice() {
            [lat, lng] => Point::new(parse_number(lat)?, parse_number(lng)?),
            _ => None,
        },
        _ => None,
    }
}

fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn cell_item(value: &Value) -> Option<CellItem> {
    let point = parse_position(value)?;
    Some(CellItem {
        point,
        key: GridKey::from_point(point),
    })
}

fn pixel_item(value: &Value) -> Option<PixelItem> {
    let point = parse_position(value.get("position")?)?;
    let color = Color::parse(value.get("color")?.as_str()?)?;
    let opacity = match value.get("opacity") {
        None | Some(Value::Null) => 1.0,
        Some(raw) => parse_number(raw).filter(|o| o.is_finite())?.clamp(0.0, 1.0),
    };

    Some(PixelItem {
        point,
        key: GridKey::from_point(point),
        color,
        opacity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch_error(result: Result<impl std::fmt::Debug, IngestError>) -> BatchError {
        match result {
            Err(IngestError::InvalidBatch(err)) => err,
            other => panic!("expected a batch error, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_shape_errors() {
        assert_eq!(batch_error(cells(&json!({}), 50)), BatchError::Missing("cells"));
        assert_eq!(
            batch_error(cells(&json!({"cells": null}), 50)),
            BatchError::Missing("cells")
        );
        assert_eq!(
            batch_error(cells(&json!({"cells": "1,2"}), 50)),
            BatchError::NotAList("cells")
        );
        assert_eq!(batch_error(cells(&json!({"cells": []}), 50)), BatchError::Empty);
        assert_eq!(
            batch_error(pixels(&json!({"cells": ["1,2"]}), 50)),
            BatchError::Missing("pixels")
        );
    }

    #[test]
    fn test_batch_size_bound() {
        let at_limit: Vec<String> = (0..50).map(|i| format!("{},{}", i, i)).collect();
        let partition = cells(&json!({ "cells": at_limit }), 50).unwrap();
        assert_eq!(partition.accepted.len(), 50);
        assert!(partition.rejected.is_empty());

        let over_limit: Vec<String> = (0..51).map(|i| format!("{},{}", i, i)).collect();
        assert_eq!(
            batch_error(cells(&json!({ "cells": over_limit }), 50)),
            BatchError::TooLarge { max: 50 }
        );
    }

    #[test]
    fn test_cell_items_are_filtered() {
        let body = json!({
            "cells": [
                "55.75,37.62",
                [40.71, -74.0],
                ["1.5", "2.5"],
                "91,0",
                "0,181",
                "abc,1",
                "1,2,3",
                [1.0],
                42,
                {"lat": 1, "lng": 2},
            ]
        });

        let partition = cells(&body, 50).unwrap();
        assert_eq!(partition.accepted.len(), 3);
        assert_eq!(partition.rejected.len(), 7);
        assert_eq!(partition.rejected[0], json!("91,0"));
    }

    #[test]
    fn test_no_valid_items() {
        let result = cells(&json!({"cells": ["nope", "100,100"]}), 50);
        assert!(matches!(result, Err(IngestError::NoValidItems)));
    }

    #[test]
    fn test_pixel_items_are_filtered() {
        let body = json!({
            "pixels": [
                {"position": "55.75,37.62", "color": "#FF0000"},
                {"position": [10, 20], "color": "#0f0", "opacity": 2.5},
                {"position": "1,2", "color": "#00f", "opacity": "0.25"},
                {"position": "1,2"},
                {"color": "#ffffff"},
                {"position": "1,2", "color": "blue"},
                {"position": "1,2", "color": "#ffffff", "opacity": "opaque"},
                "55.75,37.62",
            ]
        });

        let partition = pixels(&body, 50).unwrap();
        assert_eq!(partition.accepted.len(), 3);
        assert_eq!(partition.rejected.len(), 5);

        let first = &partition.accepted[0];
        assert_eq!(first.color.as_str(), "#ff0000");
        assert_eq!(first.opacity, 1.0);
        assert_eq!(partition.accepted[1].opacity, 1.0);
        assert_eq!(partition.accepted[1].color.as_str(), "#00ff00");
        assert_eq!(partition.accepted[2].opacity, 0.25);
    }

    #[test]
    fn test_items_quantize_to_grid() {
        let body = json!({"cells": ["55.75,37.62", "55.7501,37.6201"]});
        let partition = cells(&body, 50).unwrap();
        assert_eq!(partition.accepted[0].key, partition.accepted[1].key);
    }
}
