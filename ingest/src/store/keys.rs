use crate::model::BatchKind;

/// Store keys owned by one batch kind.
///
/// `records` is a set of grid keys for cells and a hash of grid key to
/// pixel record for pixels. `reveal_order` scores each cell by the time it
/// was first revealed. The colour keys are only written for pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    pub records: String,
    pub total: String,
    pub countries: String,
    pub water: String,
    pub timeline: String,
    pub reveal_order: String,
    pub colors: String,
    pub country_colors: String,
}

impl Keyspace {
    pub fn new(prefix: &str, kind: BatchKind) -> Self {
        let base = format!("{}:{}", prefix, kind.as_str());
        Keyspace {
            records: base.clone(),
            total: format!("{base}:total"),
            countries: format!("{base}:countries"),
            water: format!("{base}:water"),
            timeline: format!("{base}:timeline"),
            reveal_order: format!("{base}:order"),
            colors: format!("{base}:colors"),
            country_colors: format!("{base}:country_colors"),
        }
    }
}
