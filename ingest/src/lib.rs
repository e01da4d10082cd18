pub mod api;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod model;
pub mod orchestrator;
pub mod presence;
pub mod rate_limit;
pub mod stats;
pub mod store;
pub mod validate;

use crate::api::AppState;
use crate::config::Config;
use crate::errors::ServiceError;
use crate::orchestrator::Ingestor;
use crate::stats::StateReader;
use crate::store::StateStore;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;

/// Milliseconds since the Unix epoch. Timeline scores and rate-limit windows
/// use this clock.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Serves the game API and the admin endpoints until either listener fails.
pub async fn run(config: Config) -> Result<(), ServiceError> {
    config.validate()?;

    let store = store::build(&config.store)?;
    let classifier = geocoder::build_classifier(&config.classifier)?;

    let state = Arc::new(AppState {
        ingestor: Ingestor::new(&config, store.clone(), classifier),
        reader: StateReader::new(&config, store.clone()),
        environment: config.environment,
    });
    let app = api::router(state).into_make_service_with_connect_info::<SocketAddr>();

    let listener = TcpListener::bind((config.listener.host.as_str(), config.listener.port)).await?;
    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        environment = ?config.environment,
        "serving game api"
    );
    let api_task = async { axum::serve(listener, app).await.map_err(ServiceError::from) };

    let admin = AdminService::new(move || {
        let store = store.clone();
        async move {
            match store.ping().await {
                Ok(()) => true,
                Err(err) => {
                    tracing::warn!(error = %err, "store is not ready");
                    false
                }
            }
        }
    });
    let admin_listener = &config.admin_listener;
    let admin_task = async {
        run_http_service::<_, std::io::Error>(&admin_listener.host, admin_listener.port, admin)
            .await
            .map_err(ServiceError::from)
    };

    tokio::try_join!(api_task, admin_task)?;
    Ok(())
}
