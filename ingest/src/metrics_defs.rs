//! Metrics definitions for the ingest service.

use shared::metrics_defs::{MetricDef, MetricType};

pub const BATCH_RECEIVED: MetricDef = MetricDef {
    name: "ingest.batch.received",
    metric_type: MetricType::Counter,
    description: "Batch requests received. Tagged with kind.",
};

pub const BATCH_REJECTED: MetricDef = MetricDef {
    name: "ingest.batch.rejected",
    metric_type: MetricType::Counter,
    description: "Batch requests rejected as a whole. Tagged with kind and reason.",
};

pub const ITEMS_PROCESSED: MetricDef = MetricDef {
    name: "ingest.items.processed",
    metric_type: MetricType::Counter,
    description: "Accepted batch items. Tagged with kind.",
};

pub const ITEMS_REJECTED: MetricDef = MetricDef {
    name: "ingest.items.rejected",
    metric_type: MetricType::Counter,
    description: "Batch items dropped by per-item validation. Tagged with kind.",
};

pub const RATE_LIMITED: MetricDef = MetricDef {
    name: "ingest.rate_limited",
    metric_type: MetricType::Counter,
    description: "Requests rejected by the per-client rate limiter",
};

pub const STORE_ERRORS: MetricDef = MetricDef {
    name: "ingest.store.errors",
    metric_type: MetricType::Counter,
    description: "Failed store operations. Tagged with op.",
};

pub const INGEST_DURATION: MetricDef = MetricDef {
    name: "ingest.duration",
    metric_type: MetricType::Histogram,
    description: "Time to process one batch in seconds. Tagged with kind.",
};

pub const ONLINE_PLAYERS: MetricDef = MetricDef {
    name: "ingest.online_players",
    metric_type: MetricType::Gauge,
    description: "Most recent online player estimate. Tagged with kind.",
};

pub const RATE_LIMIT_CLIENTS: MetricDef = MetricDef {
    name: "ingest.rate_limit.clients",
    metric_type: MetricType::Gauge,
    description: "Client windows tracked by the rate limiter after the last sweep",
};

pub const ALL_METRICS: &[MetricDef] = &[
    BATCH_RECEIVED,
    BATCH_REJECTED,
    ITEMS_PROCESSED,
    ITEMS_REJECTED,
    RATE_LIMITED,
    STORE_ERRORS,
    INGEST_DURATION,
    ONLINE_PLAYERS,
    RATE_LIMIT_CLIENTS,
];
