// Coarse open-ocean boxes. They deliberately stay clear of coastlines so the
// pre-filter only removes points that are certainly at sea.
use crate::grid::Point;
use crate::rules::Rect;

pub static WATER_BODIES: &[(&str, Rect)] = &[
    ("arctic", Rect::new(84.0, 90.0, -180.0, 180.0)),
    ("southern", Rect::new(-62.0, -56.0, -180.0, 180.0)),
    ("north_pacific", Rect::new(25.0, 50.0, -175.0, -130.0)),
    ("south_pacific", Rect::new(-40.0, 15.0, -170.0, -100.0)),
    ("north_atlantic", Rect::new(20.0, 50.0, -50.0, -25.0)),
    ("south_atlantic", Rect::new(-50.0, 3.0, -30.0, 8.0)),
    ("indian", Rect::new(-45.0, 5.0, 55.0, 95.0)),
];

/// Name of the first water body containing `point`, if any.
pub fn water_body(point: Point) -> Option<&'static str> {
    WATER_BODIES
        .iter()
        .find(|(_, rect)| rect.contains(point))
        .map(|(name, _)| *name)
}

pub fn is_water(point: Point) -> bool {
    water_body(point).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::classify;

    #[test]
    fn test_open_ocean() {
        assert_eq!(water_body(Point::new(0.0, 0.0).unwrap()), Some("south_atlantic"));
        assert_eq!(water_body(Point::new(0.0, -140.0).unwrap()), Some("south_pacific"));
        assert_eq!(water_body(Point::new(35.0, -40.0).unwrap()), Some("north_atlantic"));
        assert_eq!(water_body(Point::new(-20.0, 75.0).unwrap()), Some("indian"));
        assert_eq!(water_body(Point::new(88.0, 10.0).unwrap()), Some("arctic"));
    }

    #[test]
    fn test_water_boxes_avoid_reference_land() {
        for (lat, lng) in [
            (55.75, 37.62),
            (40.71, -74.00),
            (21.30, -157.86),
            (47.56, -52.71),
            (-23.55, -46.63),
            (-33.92, 18.42),
            (6.93, 79.85),
            (-18.88, 47.51),
            (-55.98, -67.27),
        ] {
            let point = Point::new(lat, lng).unwrap();
            assert!(!is_water(point), "({lat}, {lng}) is land");
        }
    }

    #[test]
    fn test_water_and_land_rules_do_not_overlap_at_probes() {
        // Any probe inside a water box must not be claimed by a land rule.
        for (_, rect) in WATER_BODIES {
            let probe = Point::new(
                (rect.lat_min + rect.lat_max) / 2.0,
                (rect.lng_min + rect.lng_max) / 2.0,
            )
            .unwrap();
            if rect.lat_max < 80.0 && rect.lat_min > -60.0 {
                assert!(classify(probe).is_unknown(), "{probe:?}");
            }
        }
    }
}
