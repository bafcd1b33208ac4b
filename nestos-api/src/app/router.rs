use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_container, docker_stats, docker_system, get_container, get_info, get_logs,
    handler_404, health, list_containers, list_images, pull_image, reboot, remove_container,
    remove_image, run_performance, shutdown, start_container, stop_container, update,
};
use super::middleware::auth_middleware;
use super::state::AppState;

/// 根据配置的来源列表构建 CorsLayer
fn build_cors_layer(cors_origins: Vec<String>) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if cors_origins.is_empty() {
        tracing::warn!(
            "NESTOS_CORS_ORIGINS not configured, allowing all origins. \
             Set NESTOS_CORS_ORIGINS in production."
        );
        base.allow_origin(AllowOrigin::any())
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .into_iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        base.allow_origin(origins).allow_credentials(true)
    }
}

/// Build the router with routes and middleware wired.
pub fn app_router(state: AppState, cors_origins: Vec<String>) -> Router {
    let system_routes = Router::new()
        .route("/health", get(health))
        .route("/info", get(get_info))
        .route("/performance", post(run_performance));

    let control_routes = Router::new()
        .route("/reboot", post(reboot))
        .route("/shutdown", post(shutdown))
        .route("/update", post(update))
        .route("/logs", get(get_logs));

    let docker_routes = Router::new()
        .route(
            "/docker/containers",
            get(list_containers).post(create_container),
        )
        .route(
            "/docker/containers/:id",
            get(get_container).delete(remove_container),
        )
        .route("/docker/containers/:id/start", post(start_container))
        .route("/docker/containers/:id/stop", post(stop_container))
        .route("/docker/images", get(list_images))
        .route("/docker/images/pull", post(pull_image))
        .route("/docker/images/:id", axum::routing::delete(remove_image))
        .route("/docker/system", get(docker_system))
        .route("/docker/stats", get(docker_stats));

    Router::new()
        .merge(system_routes)
        .merge(control_routes)
        .merge(docker_routes)
        .fallback(handler_404)
        .layer(from_fn_with_state(state.clone(), auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(cors_origins))
        .with_state(state)
}
