//! Docker 容器与镜像管理

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use nestos_core::{
    ContainerDetails, ContainerSpec, ContainerStats, ContainerSummary, CreatedContainer,
    EngineInfo, ImageSummary, PullRequest,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::instrument;

use crate::app::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub all: bool,
}

#[instrument(skip_all)]
pub async fn list_containers(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<ContainerSummary>>, ApiError> {
    let Query(query) = query?;
    Ok(Json(state.manager.list_containers(query.all).await?))
}

#[instrument(skip_all, fields(container_id = %id))]
pub async fn get_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ContainerDetails>, ApiError> {
    Ok(Json(state.manager.inspect_container(&id).await?))
}

#[instrument(skip_all)]
pub async fn create_container(
    State(state): State<AppState>,
    body: Result<Json<ContainerSpec>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedContainer>), ApiError> {
    let Json(spec) = body?;
    let created = state.manager.create_container(&spec).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[instrument(skip_all, fields(container_id = %id))]
pub async fn start_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.manager.start_container(&id).await?;
    Ok(Json(json!({ "id": id, "status": "started" })))
}

#[instrument(skip_all, fields(container_id = %id))]
pub async fn stop_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.manager.stop_container(&id).await?;
    Ok(Json(json!({ "id": id, "status": "stopped" })))
}

#[instrument(skip_all, fields(container_id = %id))]
pub async fn remove_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.manager.remove_container(&id).await?;
    Ok(Json(json!({ "id": id, "status": "removed" })))
}

#[instrument(skip_all)]
pub async fn list_images(
    State(state): State<AppState>,
) -> Result<Json<Vec<ImageSummary>>, ApiError> {
    Ok(Json(state.manager.list_images().await?))
}

#[instrument(skip_all)]
pub async fn pull_image(
    State(state): State<AppState>,
    body: Result<Json<PullRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body?;
    let image = state.manager.pull_image(&request).await?;
    Ok(Json(json!({ "image": image, "status": "pulled" })))
}

#[instrument(skip_all, fields(image_id = %id))]
pub async fn remove_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.manager.remove_image(&id).await?;
    Ok(Json(json!({ "id": id, "status": "removed" })))
}

#[instrument(skip_all)]
pub async fn docker_system(State(state): State<AppState>) -> Result<Json<EngineInfo>, ApiError> {
    Ok(Json(state.manager.docker_info().await?))
}

/// 所有运行中容器的资源统计
#[instrument(skip_all)]
pub async fn docker_stats(
    State(state): State<AppState>,
) -> Result<Json<Vec<ContainerStats>>, ApiError> {
    Ok(Json(state.manager.container_stats().await?))
}
