//! Metrics definitions for the geocoder.

use shared::metrics_defs::{MetricDef, MetricType};

pub const REMOTE_CACHE_HIT: MetricDef = MetricDef {
    name: "geocoder.remote.cache.hit",
    metric_type: MetricType::Counter,
    description: "Remote classifications served from the in-memory cache",
};

pub const REMOTE_CACHE_MISS: MetricDef = MetricDef {
    name: "geocoder.remote.cache.miss",
    metric_type: MetricType::Counter,
    description: "Remote classifications that required an outbound request",
};

pub const REMOTE_FALLBACK: MetricDef = MetricDef {
    name: "geocoder.remote.fallback",
    metric_type: MetricType::Counter,
    description: "Remote classifications that fell back to the local heuristic. Tagged with reason.",
};

pub const REMOTE_DURATION: MetricDef = MetricDef {
    name: "geocoder.remote.duration",
    metric_type: MetricType::Histogram,
    description: "Outbound remote classification latency in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REMOTE_CACHE_HIT,
    REMOTE_CACHE_MISS,
    REMOTE_FALLBACK,
    REMOTE_DURATION,
];
