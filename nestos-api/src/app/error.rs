use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nestos_core::NestError;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError {
    code: &'static str,
    message: String,
    status: StatusCode,
}

impl ApiError {
    pub fn new(code: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new("Unauthorized", StatusCode::UNAUTHORIZED, "unauthorized")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BadRequest", StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NotFound", StatusCode::NOT_FOUND, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new("TooManyRequests", StatusCode::TOO_MANY_REQUESTS, message)
    }
}

impl From<NestError> for ApiError {
    fn from(err: NestError) -> Self {
        match err {
            NestError::NotFound(msg) => ApiError::not_found(msg),
            NestError::InvalidInput(msg) => ApiError::new("InvalidInput", StatusCode::BAD_REQUEST, msg),
            err @ NestError::CommandFailed { .. } => ApiError::new(
                "CommandFailed",
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
            ),
            err @ NestError::Spawn { .. } => {
                ApiError::new("SpawnFailed", StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            NestError::Docker(e) => {
                ApiError::new("DockerError", StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            NestError::Io(e) => {
                ApiError::new("IoError", StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            NestError::Serde(e) => {
                ApiError::new("SerdeError", StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            NestError::Other(msg) => {
                ApiError::new("Error", StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        }
    }
}

// 请求体/查询参数格式错误统一按 400 返回
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "request failed");
        }
        let body = Json(json!({
            "code": self.code,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}
