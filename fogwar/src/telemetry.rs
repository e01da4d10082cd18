use crate::config::{LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::{StatsdBuilder, StatsdError};
use shared::metrics_defs::describe_all;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, filter::ParseError};

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] ParseError),

    #[error("could not install log subscriber: {0}")]
    Subscriber(#[from] TryInitError),

    #[error("could not create statsd exporter: {0}")]
    Statsd(#[from] StatsdError),

    #[error("a metrics recorder is already installed")]
    RecorderInstalled,
}

/// Keeps the Sentry client alive. Events are flushed when it is dropped.
pub struct Telemetry {
    _sentry: Option<sentry::ClientInitGuard>,
}

pub fn init(
    logging: Option<&LoggingConfig>,
    metrics: Option<&MetricsConfig>,
) -> Result<Telemetry, TelemetryError> {
    let default_logging = LoggingConfig::default();
    let logging = logging.unwrap_or(&default_logging);

    let sentry = logging.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)?,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .try_init()?;

    if let Some(metrics) = metrics {
        let recorder =
            StatsdBuilder::from(metrics.statsd_host.as_str(), metrics.statsd_port)
                .build(Some(metrics.prefix.as_str()))?;
        metrics::set_global_recorder(recorder).map_err(|_| TelemetryError::RecorderInstalled)?;
        tracing::info!(
            host = %metrics.statsd_host,
            port = metrics.statsd_port,
            "sending metrics to statsd"
        );
    }

    describe_all(ingest::metrics_defs::ALL_METRICS);
    describe_all(geocoder::metrics_defs::ALL_METRICS);

    Ok(Telemetry { _sentry: sentry })
}
