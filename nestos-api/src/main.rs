mod app;

use anyhow::{bail, Context};
use app::{app_router, AppState, RateLimiter};
use dotenvy::dotenv;
use nestos_core::{DockerEngine, HostManager, ManagerConfig, SystemCommandRunner};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 认证失败限流：每个 IP 每分钟 20 次
const AUTH_FAILURES_PER_MINUTE: usize = 20;

#[derive(Debug, Clone)]
struct ApiConfig {
    bind: SocketAddr,
    /// 访问令牌；未设置时不做认证
    api_token: Option<String>,
    /// CORS 允许的来源列表（空则允许所有）
    cors_origins: Vec<String>,
    docker_socket: Option<String>,
    /// 是否按代理头识别客户端 IP
    trust_proxy: bool,
    manager: ManagerConfig,
}

impl ApiConfig {
    fn from_env() -> anyhow::Result<Self> {
        let bind = match env::var("NESTOS_BIND") {
            Ok(s) => s
                .parse()
                .with_context(|| format!("invalid NESTOS_BIND: {s}"))?,
            Err(_) => SocketAddr::from(([0, 0, 0, 0], 3001)),
        };

        let api_token = env::var("NESTOS_API_TOKEN")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(token) = &api_token {
            if token.len() < 16 {
                bail!("NESTOS_API_TOKEN is too short (<16); please use a strong random value");
            }
        }

        // 逗号分隔；空或 "*" 表示允许所有
        let cors_origins = env::var("NESTOS_CORS_ORIGINS")
            .ok()
            .map(|s| {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed == "*" {
                    vec![]
                } else {
                    trimmed
                        .split(',')
                        .filter(|t| !t.trim().is_empty())
                        .map(|t| t.trim().to_string())
                        .collect()
                }
            })
            .unwrap_or_default();

        let docker_socket = env::var("NESTOS_DOCKER_SOCKET")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let trust_proxy = env::var("NESTOS_TRUST_PROXY")
            .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let defaults = ManagerConfig::default();
        let path_var = |name: &str, default: PathBuf| {
            env::var(name).map(PathBuf::from).unwrap_or(default)
        };
        let manager = ManagerConfig {
            syslog_path: path_var("NESTOS_SYSLOG_PATH", defaults.syslog_path),
            bench_dir: path_var("NESTOS_BENCH_DIR", defaults.bench_dir),
            memory_dir: path_var("NESTOS_MEMORY_DIR", defaults.memory_dir),
        };

        Ok(Self {
            bind,
            api_token,
            cors_origins,
            docker_socket,
            trust_proxy,
            manager,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 优先读取 .env（若存在）
    let _ = dotenv();
    init_tracing();

    let config = ApiConfig::from_env()?;
    info!("starting API on {}", config.bind);
    if config.api_token.is_none() {
        tracing::warn!("NESTOS_API_TOKEN not set; all endpoints are unauthenticated");
    }

    let engine = DockerEngine::connect(config.docker_socket.as_deref())
        .context("failed to configure docker client")?;
    let manager = Arc::new(HostManager::new(
        Arc::new(SystemCommandRunner),
        Arc::new(engine),
        config.manager.clone(),
    ));

    let state = AppState {
        manager,
        api_token: config.api_token.clone(),
        auth_limiter: Arc::new(RateLimiter::new(
            AUTH_FAILURES_PER_MINUTE,
            Duration::from_secs(60),
        )),
        trust_proxy: config.trust_proxy,
    };

    let app = app_router(state, config.cors_origins.clone());
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("API stopped");
    Ok(())
}

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
