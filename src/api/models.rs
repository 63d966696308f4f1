//! Request and response bodies for the HTTP API.
//!
//! ```json
//! POST /factor        {"number": 12}
//! 202 Accepted        {"task_id": 48213377}
//!
//! GET /get/48213377
//! 200 OK              {"task_id": 48213377, "result": "2,2,3", "status": "done"}
//! ```
//!
//! `result` is the stored status text verbatim: `Calculating...`, the
//! comma-joined factors, or `Failed: <reason>`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::observability::MetricsSnapshot;
use crate::queue::JobId;
use crate::status::{ConnectionStats, StatusKind};
use crate::worker::PoolStats;

#[derive(Debug, Deserialize, Clone)]
pub struct FactorRequest {
    pub number: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SubmitResponse {
    pub task_id: JobId,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResultResponse {
    pub task_id: JobId,
    pub result: String,
    /// `null` for text this service did not write
    pub status: Option<StatusKind>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub jobs: MetricsSnapshot,
    pub queue_depth: usize,
    pub pool: PoolStats,
    /// Absent for backends without a connection pool
    pub store_connections: Option<ConnectionStats>,
}
