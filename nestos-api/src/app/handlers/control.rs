//! 电源控制、系统更新与日志

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use nestos_core::UpdateOutcome;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::app::{ApiError, AppState};

const DEFAULT_LOG_LINES: usize = 100;
const MAX_LOG_LINES: usize = 5000;

#[instrument(skip_all)]
pub async fn reboot(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let status = state.manager.reboot().await?;
    Ok(Json(json!({ "status": status })))
}

#[instrument(skip_all)]
pub async fn shutdown(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let status = state.manager.shutdown().await?;
    Ok(Json(json!({ "status": status })))
}

#[instrument(skip_all)]
pub async fn update(State(state): State<AppState>) -> Result<Json<UpdateOutcome>, ApiError> {
    let outcome = state.manager.update().await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    pub lines: Option<usize>,
}

#[instrument(skip_all)]
pub async fn get_logs(
    State(state): State<AppState>,
    query: Result<Query<LogQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let Query(query) = query?;
    let lines = query
        .lines
        .unwrap_or(DEFAULT_LOG_LINES)
        .clamp(1, MAX_LOG_LINES);
    let logs = state.manager.system_logs(lines).await?;
    Ok(Json(json!({ "logs": logs })))
}
