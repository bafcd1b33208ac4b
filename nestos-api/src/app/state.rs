use nestos_core::HostManager;
use std::sync::Arc;

/// Shared application state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<HostManager>,
    /// 访问令牌（None 表示不启用认证）
    pub api_token: Option<String>,
    /// 认证失败限流（按 IP，防止令牌暴力破解）
    pub auth_limiter: Arc<crate::app::RateLimiter>,
    /// 是否信任 X-Real-IP / X-Forwarded-For（仅部署在反向代理之后时开启）
    pub trust_proxy: bool,
}
