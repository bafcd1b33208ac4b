//! 主机信息与性能测试

use axum::extract::{Query, State};
use axum::Json;
use nestos_core::{PerformanceResult, SystemInfo};
use serde::Deserialize;
use tracing::instrument;

use crate::app::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct InfoQuery {
    #[serde(default)]
    pub detailed: bool,
}

#[instrument(skip_all, fields(detailed))]
pub async fn get_info(
    State(state): State<AppState>,
    query: Result<Query<InfoQuery>, axum::extract::rejection::QueryRejection>,
) -> Result<Json<SystemInfo>, ApiError> {
    let Query(query) = query?;
    tracing::Span::current().record("detailed", query.detailed);
    let info = state.manager.system_info(query.detailed).await?;
    Ok(Json(info))
}

/// 运行完整性能测试（耗时十秒以上）
#[instrument(skip_all)]
pub async fn run_performance(
    State(state): State<AppState>,
) -> Result<Json<PerformanceResult>, ApiError> {
    let result = state.manager.run_performance_test().await?;
    Ok(Json(result))
}
