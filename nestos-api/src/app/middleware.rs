use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use super::error::ApiError;
use super::state::AppState;

/// 不需要认证的路径
const PUBLIC_PATHS: &[&str] = &["/health"];

/// 从请求中提取 token（优先 header，fallback 到 query param）
fn extract_token(request: &Request<Body>) -> Option<String> {
    if let Some(token) = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.to_string());
    }

    request.uri().query().and_then(|query| {
        query.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if key == "token" {
                urlencoding::decode(value).ok().map(|s| s.into_owned())
            } else {
                None
            }
        })
    })
}

/// 从请求中提取客户端 IP
/// 仅在 `trust_proxy` 时读取 X-Real-IP > X-Forwarded-For（第一个），否则只用 Socket Address
fn extract_client_ip(request: &Request<Body>, trust_proxy: bool) -> String {
    if trust_proxy {
        if let Some(real_ip) = request
            .headers()
            .get("X-Real-IP")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return real_ip.to_string();
        }

        if let Some(first_ip) = request
            .headers()
            .get("X-Forwarded-For")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
        {
            return first_ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn token_matches(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    // 未配置令牌时不做认证
    let Some(expected) = state.api_token.as_deref() else {
        return Ok(next.run(request).await);
    };

    let path = request.uri().path().to_string();
    if PUBLIC_PATHS.iter().any(|p| path == *p) {
        return Ok(next.run(request).await);
    }

    // 超限后即使令牌正确也拒绝，直到窗口过期
    let client_ip = extract_client_ip(&request, state.trust_proxy);
    if !state.auth_limiter.check(&client_ip).await {
        tracing::warn!(ip = %client_ip, path = %path, "auth rate limit exceeded");
        return Err(ApiError::too_many_requests("too many requests, please retry later"));
    }

    let authorized = extract_token(&request).is_some_and(|token| token_matches(expected, &token));
    if authorized {
        return Ok(next.run(request).await);
    }

    // 只统计失败的认证
    state.auth_limiter.record(&client_ip).await;
    tracing::debug!(ip = %client_ip, path = %path, "rejected unauthenticated request");
    Err(ApiError::unauthorized())
}
