//! Ordered bounding-box rules mapping a coordinate to a country code.
//!
//! Rectangles overlap on purpose: smaller countries are listed before the
//! larger neighbours whose boxes cover them, and the first matching rule wins.
//! A `Split` rule approximates a border running through a shared box by
//! comparing a single axis against a threshold.

use crate::CountryCode;
use crate::grid::Point;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
}

impl Rect {
    pub const fn new(lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64) -> Self {
        Rect {
            lat_min,
            lat_max,
            lng_min,
            lng_max,
        }
    }

    /// Inclusive on every edge.
    pub fn contains(&self, point: Point) -> bool {
        point.lat >= self.lat_min
            && point.lat <= self.lat_max
            && point.lng >= self.lng_min
            && point.lng <= self.lng_max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Lat,
    Lng,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Country(&'static str),
    /// `below` when the point's coordinate on `axis` is strictly less than `at`.
    Split {
        axis: Axis,
        at: f64,
        below: &'static str,
        above: &'static str,
    },
}

impl Outcome {
    fn resolve(&self, point: Point) -> &'static str {
        match *self {
            Outcome::Country(code) => code,
            Outcome::Split {
                axis,
                at,
                below,
                above,
            } => {
                let value = match axis {
                    Axis::Lat => point.lat,
                    Axis::Lng => point.lng,
                };
                if value < at { below } else { above }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rule {
    pub rect: Rect,
    pub outcome: Outcome,
}

const fn country(lat_min: f64, lat_max: f64, lng_min: f64, lng_max: f64, code: &'static str) -> Rule {
    Rule {
        rect: Rect::new(lat_min, lat_max, lng_min, lng_max),
        outcome: Outcome::Country(code),
    }
}

const fn split(
    rect: Rect,
    axis: Axis,
    at: f64,
    below: &'static str,
    above: &'static str,
) -> Rule {
    Rule {
        rect,
        outcome: Outcome::Split {
            axis,
            at,
            below,
            above,
        },
    }
}

/// The single rule table used by every ingest path.
pub static RULES: &[Rule] = &[
    // Western Europe and the Maghreb
    country(51.4, 55.4, -10.6, -6.0, "IE"),
    country(49.9, 60.9, -8.7, 1.8, "GB"),
    country(36.9, 42.2, -9.6, -6.2, "PT"),
    // Algerian coast sits under the southern edge of the Spanish box.
    split(Rect::new(36.0, 37.2, -1.0, 3.3), Axis::Lat, 37.0, "DZ", "ES"),
    country(36.0, 43.8, -9.4, 3.3, "ES"),
    country(27.6, 35.9, -13.2, -1.0, "MA"),
    country(30.2, 37.4, 7.5, 11.6, "TN"),
    country(19.0, 37.1, -8.7, 12.0, "DZ"),
    country(50.7, 53.6, 3.3, 7.2, "NL"),
    country(49.5, 51.5, 2.5, 6.4, "BE"),
    country(45.8, 47.8, 5.9, 10.5, "CH"),
    country(48.6, 51.0, 12.9, 18.9, "CZ"),
    country(54.5, 57.8, 8.0, 12.7, "DK"),
    country(47.3, 55.1, 5.9, 15.0, "DE"),
    country(46.4, 49.0, 9.5, 17.2, "AT"),
    country(41.3, 51.1, -5.2, 9.6, "FR"),
    country(36.6, 47.1, 6.6, 18.5, "IT"),
    // Central and Eastern Europe
    country(45.7, 48.6, 16.1, 22.9, "HU"),
    country(42.2, 46.2, 18.8, 23.0, "RS"),
    country(43.6, 48.3, 20.3, 29.7, "RO"),
    country(41.2, 44.2, 22.4, 28.6, "BG"),
    split(Rect::new(55.3, 71.2, 4.5, 24.2), Axis::Lng, 12.5, "NO", "SE"),
    country(59.8, 70.1, 20.5, 31.6, "FI"),
    country(57.5, 59.7, 21.8, 28.2, "EE"),
    country(55.7, 58.1, 20.9, 28.2, "LV"),
    country(53.9, 56.5, 21.0, 26.8, "LT"),
    country(49.0, 54.9, 14.1, 24.2, "PL"),
    country(51.3, 56.2, 23.2, 32.8, "BY"),
    country(44.4, 52.4, 22.1, 40.2, "UA"),
    country(34.8, 41.8, 19.3, 28.3, "GR"),
    // Middle East and Central Asia
    country(35.8, 42.1, 26.0, 44.8, "TR"),
    country(29.5, 33.3, 34.2, 35.9, "IL"),
    country(22.0, 31.7, 24.7, 36.9, "EG"),
    country(25.0, 39.8, 44.0, 63.3, "IR"),
    country(16.0, 32.2, 34.5, 55.7, "SA"),
    country(40.6, 55.4, 46.5, 87.3, "KZ"),
    // South, South-East and East Asia
    split(Rect::new(23.7, 37.1, 60.9, 77.8), Axis::Lng, 74.5, "PK", "IN"),
    country(28.0, 35.5, 80.0, 97.4, "CN"),
    country(6.7, 35.5, 68.1, 97.4, "IN"),
    country(5.6, 20.5, 97.3, 105.6, "TH"),
    country(8.5, 23.4, 102.1, 109.5, "VN"),
    country(4.6, 21.1, 116.9, 126.6, "PH"),
    country(-11.0, 6.0, 95.0, 141.0, "ID"),
    country(21.9, 25.3, 120.0, 122.0, "TW"),
    country(30.0, 45.6, 129.5, 146.0, "JP"),
    split(Rect::new(33.0, 43.0, 124.2, 131.9), Axis::Lat, 38.0, "KR", "KP"),
    country(41.6, 52.1, 87.8, 119.9, "MN"),
    country(18.2, 53.6, 73.5, 134.8, "CN"),
    country(41.2, 81.9, 27.0, 180.0, "RU"),
    // Africa
    country(4.2, 13.9, 2.7, 14.7, "NG"),
    country(3.4, 14.9, 33.0, 48.0, "ET"),
    country(-4.7, 5.0, 33.9, 41.9, "KE"),
    country(-13.5, 5.4, 12.2, 31.3, "CD"),
    country(-34.9, -22.1, 16.4, 32.9, "ZA"),
    // North America
    country(51.0, 71.4, -179.2, -141.0, "US"),
    country(18.9, 22.3, -160.3, -154.8, "US"),
    country(63.3, 66.6, -24.6, -13.5, "IS"),
    country(59.8, 83.6, -60.0, -11.3, "GL"),
    country(14.5, 29.5, -118.4, -86.7, "MX"),
    country(19.8, 23.3, -85.0, -74.1, "CU"),
    split(Rect::new(24.5, 83.1, -141.0, -52.6), Axis::Lat, 49.0, "US", "CA"),
    // South America
    country(-4.2, 12.5, -79.0, -67.0, "CO"),
    country(0.6, 12.2, -73.4, -59.8, "VE"),
    country(-18.4, 0.0, -81.4, -68.7, "PE"),
    country(-56.0, -17.5, -75.7, -70.0, "CL"),
    country(-55.1, -21.8, -73.6, -53.6, "AR"),
    country(-33.8, 5.3, -74.0, -34.7, "BR"),
    // Oceania and Antarctica
    country(-47.3, -34.4, 166.4, 178.6, "NZ"),
    country(-43.7, -10.7, 113.3, 153.6, "AU"),
    country(-90.0, -62.0, -180.0, 180.0, "AQ"),
];

pub fn classify(point: Point) -> CountryCode {
    classify_with(RULES, point)
}

/// First matching rule wins; no match yields `CountryCode::UNKNOWN`.
pub fn classify_with(rules: &[Rule], point: Point) -> CountryCode {
    rules
        .iter()
        .find(|rule| rule.rect.contains(point))
        .map(|rule| CountryCode::from_static(rule.outcome.resolve(point)))
        .unwrap_or(CountryCode::UNKNOWN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_at(lat: f64, lng: f64) -> String {
        classify(Point::new(lat, lng).unwrap()).as_str().to_string()
    }

    #[test]
    fn test_reference_cities() {
        let cases = [
            ((55.75, 37.62), "RU"),
            ((40.71, -74.00), "US"),
            ((51.51, -0.13), "GB"),
            ((48.86, 2.35), "FR"),
            ((52.52, 13.40), "DE"),
            ((50.08, 14.44), "CZ"),
            ((48.21, 16.37), "AT"),
            ((41.90, 12.50), "IT"),
            ((40.42, -3.70), "ES"),
            ((38.72, -9.14), "PT"),
            ((36.75, 3.06), "DZ"),
            ((59.33, 18.07), "SE"),
            ((59.91, 10.75), "NO"),
            ((60.17, 24.94), "FI"),
            ((52.23, 21.01), "PL"),
            ((50.45, 30.52), "UA"),
            ((47.50, 19.04), "HU"),
            ((44.79, 20.45), "RS"),
            ((44.43, 26.10), "RO"),
            ((42.70, 23.32), "BG"),
            ((37.98, 23.73), "GR"),
            ((41.01, 28.98), "TR"),
            ((30.04, 31.24), "EG"),
            ((32.09, 34.78), "IL"),
            ((35.69, 51.39), "IR"),
            ((24.71, 46.68), "SA"),
            ((43.24, 76.95), "KZ"),
            ((28.61, 77.21), "IN"),
            ((24.86, 67.00), "PK"),
            ((29.65, 91.10), "CN"),
            ((39.90, 116.40), "CN"),
            ((35.68, 139.69), "JP"),
            ((37.57, 126.98), "KR"),
            ((39.03, 125.75), "KP"),
            ((47.89, 106.90), "MN"),
            ((13.76, 100.50), "TH"),
            ((21.03, 105.85), "VN"),
            ((14.60, 121.00), "PH"),
            ((-6.20, 106.80), "ID"),
            ((25.03, 121.56), "TW"),
            ((6.52, 3.38), "NG"),
            ((-1.29, 36.82), "KE"),
            ((9.03, 38.74), "ET"),
            ((-4.44, 15.27), "CD"),
            ((-26.20, 28.05), "ZA"),
            ((61.20, -149.90), "US"),
            ((21.30, -157.86), "US"),
            ((49.28, -123.12), "CA"),
            ((64.18, -51.72), "GL"),
            ((64.15, -21.94), "IS"),
            ((19.43, -99.13), "MX"),
            ((23.11, -82.37), "CU"),
            ((4.71, -74.07), "CO"),
            ((10.48, -66.90), "VE"),
            ((-12.05, -77.04), "PE"),
            ((-33.45, -70.67), "CL"),
            ((-34.60, -58.40), "AR"),
            ((-23.55, -46.63), "BR"),
            ((-36.85, 174.76), "NZ"),
            ((-33.87, 151.21), "AU"),
            ((-77.80, 166.70), "AQ"),
        ];

        for ((lat, lng), expected) in cases {
            assert_eq!(code_at(lat, lng), expected, "({lat}, {lng})");
        }
    }

    #[test]
    fn test_no_match_is_unknown() {
        assert_eq!(code_at(0.0, 0.0), "XX");
        assert_eq!(code_at(-20.0, -140.0), "XX");
        assert_eq!(code_at(30.0, -40.0), "XX");
    }

    #[test]
    fn test_first_match_wins() {
        let rules = [
            country(0.0, 10.0, 0.0, 10.0, "AA"),
            country(0.0, 20.0, 0.0, 20.0, "BB"),
        ];
        let inner = Point::new(5.0, 5.0).unwrap();
        let outer = Point::new(15.0, 15.0).unwrap();
        assert_eq!(classify_with(&rules, inner).as_str(), "AA");
        assert_eq!(classify_with(&rules, outer).as_str(), "BB");

        let reversed = [rules[1], rules[0]];
        assert_eq!(classify_with(&reversed, inner).as_str(), "BB");
    }

    #[test]
    fn test_split_threshold_is_exclusive_below() {
        let rules = [split(Rect::new(0.0, 10.0, 0.0, 10.0), Axis::Lat, 5.0, "LO", "HI")];
        assert_eq!(classify_with(&rules, Point::new(4.99, 1.0).unwrap()).as_str(), "LO");
        assert_eq!(classify_with(&rules, Point::new(5.0, 1.0).unwrap()).as_str(), "HI");
    }

    #[test]
    fn test_rect_edges_are_inclusive() {
        let rect = Rect::new(-1.0, 1.0, -2.0, 2.0);
        assert!(rect.contains(Point::new(1.0, 2.0).unwrap()));
        assert!(rect.contains(Point::new(-1.0, -2.0).unwrap()));
        assert!(!rect.contains(Point::new(1.01, 0.0).unwrap()));
    }
}
