use crate::config::Environment;
use crate::errors::IngestError;
use crate::orchestrator::Ingestor;
use crate::stats::StateReader;
use crate::unix_millis;
use crate::validate::BatchError;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    RETRY_AFTER,
};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use serde::Serialize;
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct AppState {
    pub ingestor: Ingestor,
    pub reader: StateReader,
    pub environment: Environment,
}

impl AppState {
    fn fail(&self, error: IngestError) -> ApiError {
        ApiError::from_ingest(error, self.environment)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/api/reveal-batch",
            post(reveal_batch)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/pixels-batch",
            post(pixels_batch)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/state",
            get(cell_state).options(preflight).fallback(method_not_allowed),
        )
        .route(
            "/api/pixels-state",
            get(pixel_state)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .layer(middleware::map_response(allow_cross_origin))
        .with_state(state)
}

async fn allow_cross_origin(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> ApiError {
    ApiError {
        status: StatusCode::METHOD_NOT_ALLOWED,
        code: "method_not_allowed",
        message: "Method not allowed".into(),
        retry_after: None,
        details: None,
    }
}

/// Identifies the caller for rate limiting: first `X-Forwarded-For` hop,
/// then `X-Real-IP`, then the peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    let first_hop = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    first_hop("x-forwarded-for").or_else(|| first_hop("x-real-ip"))
}

impl<S: Send + Sync> FromRequestParts<S> for ClientKey {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = forwarded_for(&parts.headers)
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string())
            })
            .unwrap_or_else(|| "unknown".to_string());
        Ok(ClientKey(key))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    retry_after: Option<u64>,
    details: Option<String>,
}

impl ApiError {
    pub fn from_ingest(error: IngestError, environment: Environment) -> Self {
        let code = error.code();
        match error {
            IngestError::InvalidBatch(_) | IngestError::NoValidItems => ApiError {
                status: StatusCode::BAD_REQUEST,
                code,
                message: error.to_string(),
                retry_after: None,
                details: None,
            },
            IngestError::RateLimited { retry_after_secs } => ApiError {
                status: StatusCode::TOO_MANY_REQUESTS,
                code,
                message: "Too many requests".into(),
                retry_after: Some(retry_after_secs),
                details: None,
            },
            IngestError::Store(_) | IngestError::Internal(_) => {
                tracing::error!(error = %error, "request failed");
                ApiError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code,
                    message: "Internal server error".into(),
                    retry_after: None,
                    details: environment
                        .exposes_internal_errors()
                        .then(|| error.to_string()),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            success: false,
            error: self.code,
            message: self.message,
            retry_after: self.retry_after,
            details: self.details,
        });

        let mut response = (self.status, body).into_response();
        if let Some(secs) = self.retry_after {
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RevealResponse {
    success: bool,
    processed: usize,
    rejected: usize,
    total_revealed: i64,
    online_players: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PixelsResponse {
    success: bool,
    processed: usize,
    rejected: usize,
    total_pixels: i64,
    online_players: u64,
}

#[derive(Serialize)]
struct StateResponse<T> {
    success: bool,
    #[serde(flatten)]
    state: T,
}

fn parse_body(body: &[u8]) -> Result<Value, IngestError> {
    serde_json::from_slice(body).map_err(|_| IngestError::InvalidBatch(BatchError::InvalidJson))
}

async fn reveal_batch(
    State(state): State<Arc<AppState>>,
    ClientKey(client): ClientKey,
    body: Bytes,
) -> Result<Json<RevealResponse>, ApiError> {
    let body = parse_body(&body).map_err(|err| state.fail(err))?;
    let outcome = state
        .ingestor
        .reveal_cells(&client, &body, unix_millis())
        .await
        .map_err(|err| state.fail(err))?;

    Ok(Json(RevealResponse {
        success: true,
        processed: outcome.processed,
        rejected: outcome.rejected,
        total_revealed: outcome.total,
        online_players: outcome.online_players,
    }))
}

async fn pixels_batch(
    State(state): State<Arc<AppState>>,
    ClientKey(client): ClientKey,
    body: Bytes,
) -> Result<Json<PixelsResponse>, ApiError> {
    let body = parse_body(&body).map_err(|err| state.fail(err))?;
    let outcome = state
        .ingestor
        .place_pixels(&client, &body, unix_millis())
        .await
        .map_err(|err| state.fail(err))?;

    Ok(Json(PixelsResponse {
        success: true,
        processed: outcome.processed,
        rejected: outcome.rejected,
        total_pixels: outcome.total,
        online_players: outcome.online_players,
    }))
}

async fn cell_state(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let cells = state
        .reader
        .cell_state(unix_millis())
        .await
        .map_err(|err| state.fail(err))?;
    Ok(Json(StateResponse {
        success: true,
        state: cells,
    })
    .into_response())
}

async fn pixel_state(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let pixels = state
        .reader
        .pixel_state(unix_millis())
        .await
        .map_err(|err| state.fail(err))?;
    Ok(Json(StateResponse {
        success: true,
        state: pixels,
    })
    .into_response())
}
