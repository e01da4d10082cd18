use crate::grid::Point;
use crate::{Location, LocationClassifier, rules, water};
use async_trait::async_trait;

/// Local rectangle classifier with an optional open-water pre-filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier {
    water_filter: bool,
}

impl HeuristicClassifier {
    pub fn new(water_filter: bool) -> Self {
        HeuristicClassifier { water_filter }
    }

    /// True when the pre-filter is enabled and `point` lies in open water.
    pub fn is_water(&self, point: Point) -> bool {
        self.water_filter && water::is_water(point)
    }

    pub fn locate(&self, point: Point) -> Location {
        if self.is_water(point) {
            return Location::Water;
        }
        Location::Country(rules::classify(point))
    }
}

#[async_trait]
impl LocationClassifier for HeuristicClassifier {
    async fn classify(&self, point: Point) -> Location {
        self.locate(point)
    }
}
