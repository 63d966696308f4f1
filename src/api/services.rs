use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::{debug, warn};

use super::{
    error::ApiError,
    models::{FactorRequest, HealthResponse, ResultResponse, StatsResponse, SubmitResponse},
    state::AppState,
    utils,
};
use crate::status::JobStatus;

const GREETING: &str = "Hello Factor app!\n";

/// Liveness banner (GET /)
pub async fn hello() -> &'static str {
    GREETING
}

/// Submit a number for factorization (POST /factor)
///
/// Body: `{"number": <integer>}`. Responds 202 with the task id as soon as
/// the job is queued; the placeholder status is already readable by then.
pub async fn submit_factor(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    utils::require_json(&headers)?;

    // decompression already handled by RequestDecompressionLayer
    let body_bytes = utils::read_body(body, state.config.server.max_body_bytes).await?;
    let request: FactorRequest = serde_json::from_slice(&body_bytes)?;

    let task_id = state.service.submit(request.number).await?;

    Ok((StatusCode::ACCEPTED, Json(SubmitResponse { task_id })))
}

/// Current status of a task (GET /get/{task_id})
///
/// Never waits for the job. `result` carries the stored text verbatim.
pub async fn get_result(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let task_id = utils::parse_task_id(&task_id)?;

    let result = state
        .service
        .get_result(task_id)
        .await?
        .ok_or(ApiError::TaskNotFound(task_id))?;

    let status = JobStatus::parse(&result).map(|s| s.kind());
    if status.is_none() {
        warn!(job_id = %task_id, value = %result, "Unrecognised status text");
    }

    Ok((
        StatusCode::OK,
        Json(ResultResponse {
            task_id,
            result,
            status,
        }),
    ))
}

/// Health check endpoint (GET /health)
///
/// Unhealthy (503) when the status store does not answer a ping or the
/// dispatcher task has stopped.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = HashMap::new();
    components.insert("api".to_string(), "healthy".to_string());

    let store = state.service.store();
    let store_status = match store.ping().await {
        Ok(()) => "healthy".to_string(),
        Err(e) => {
            warn!(backend = store.backend(), error = %e, "Status store ping failed");
            "unhealthy".to_string()
        }
    };
    components.insert(format!("status_store:{}", store.backend()), store_status);

    let dispatcher_status = if state.dispatcher_alive() {
        "healthy"
    } else {
        "unhealthy"
    };
    components.insert("dispatcher".to_string(), dispatcher_status.to_string());

    let pool_status = if state.pool.is_closed() {
        "unhealthy"
    } else {
        "healthy"
    };
    components.insert("worker_pool".to_string(), pool_status.to_string());

    let all_healthy = components.values().all(|status| status == "healthy");
    debug!(healthy = all_healthy, "Health check");

    let (status_code, overall_status) = if all_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}

/// Counters and pool occupancy (GET /operators/stats)
pub async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatsResponse {
        jobs: state.metrics.snapshot(),
        queue_depth: state.service.queue_depth(),
        pool: state.pool.stats(),
        store_connections: state.service.store().connection_stats(),
    })
}
