//! 容器创建请求与 Docker 相关的响应结构。

use crate::error::{NestError, Result};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// 端口映射：容器端口 -> 主机端口
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortMapping {
    pub container: u16,
    pub host: u16,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

/// 卷挂载：主机路径（或命名卷）-> 容器路径
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeMapping {
    pub host: String,
    pub container: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvVar {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// 重启策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicyKind {
    #[default]
    No,
    Always,
    UnlessStopped,
    OnFailure,
}

/// 创建容器的请求体，逐字段映射到 Docker Engine API 参数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// 镜像引用，如 `nginx:latest`
    pub image: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub volumes: Vec<VolumeMapping>,
    #[serde(default)]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub restart_policy: RestartPolicyKind,
    /// 创建后是否立即启动（默认 true）
    #[serde(default = "default_start")]
    pub start: bool,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

fn default_start() -> bool {
    true
}

impl ContainerSpec {
    /// 校验请求形状，失败返回 InvalidInput。
    pub fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() || self.image.chars().any(char::is_whitespace) {
            return Err(NestError::InvalidInput("invalid image reference".into()));
        }
        if let Some(name) = &self.name {
            if !is_valid_name(name) {
                return Err(NestError::InvalidInput(format!(
                    "invalid container name: {name}"
                )));
            }
        }
        for port in &self.ports {
            if port.container == 0 || port.host == 0 {
                return Err(NestError::InvalidInput("port must be between 1 and 65535".into()));
            }
            if !matches!(port.protocol.as_str(), "tcp" | "udp" | "sctp") {
                return Err(NestError::InvalidInput(format!(
                    "unsupported protocol: {}",
                    port.protocol
                )));
            }
        }
        for volume in &self.volumes {
            let host_ok = volume.host.starts_with('/') || is_valid_name(&volume.host);
            if !host_ok || !volume.container.starts_with('/') {
                return Err(NestError::InvalidInput(format!(
                    "invalid volume mapping: {}:{}",
                    volume.host, volume.container
                )));
            }
        }
        for var in &self.env {
            if var.key.is_empty() || var.key.contains('=') {
                return Err(NestError::InvalidInput(format!(
                    "invalid environment variable: {}",
                    var.key
                )));
            }
        }
        Ok(())
    }

    /// `host:container[:ro]` 形式的 bind 列表
    pub fn binds(&self) -> Vec<String> {
        self.volumes
            .iter()
            .map(|v| {
                if v.read_only {
                    format!("{}:{}:ro", v.host, v.container)
                } else {
                    format!("{}:{}", v.host, v.container)
                }
            })
            .collect()
    }

    /// `KEY=VALUE` 形式的环境变量
    pub fn env_pairs(&self) -> Vec<String> {
        self.env
            .iter()
            .map(|v| format!("{}={}", v.key, v.value))
            .collect()
    }
}

/// 容器名 / 命名卷：`[A-Za-z0-9][A-Za-z0-9_.-]*`
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// 校验路径参数中的容器/镜像 id（允许 `repo/name:tag@sha256:...`）
pub fn validate_ref(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/' | '@'));
    if valid {
        Ok(())
    } else {
        Err(NestError::InvalidInput(format!("invalid id: {id}")))
    }
}

/// 拉取镜像请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub image: String,
    #[serde(default)]
    pub tag: Option<String>,
}

impl PullRequest {
    /// 拆分为 (image, tag)；未显式指定 tag 时从 `image:tag` 中解析，缺省为 latest。
    pub fn reference(&self) -> Result<(String, String)> {
        let image = self.image.trim();
        if image.is_empty() || image.chars().any(char::is_whitespace) {
            return Err(NestError::InvalidInput("invalid image reference".into()));
        }
        if let Some(tag) = self.tag.as_deref().filter(|t| !t.is_empty()) {
            return Ok((image.to_string(), tag.to_string()));
        }
        // 冒号在最后一个 `/` 之后才是 tag（排除 registry:port）
        let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
        match image[name_start..].rfind(':') {
            Some(pos) => {
                let split = name_start + pos;
                Ok((image[..split].to_string(), image[split + 1..].to_string()))
            }
            None => Ok((image.to_string(), "latest".to_string())),
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortView {
    pub private_port: u16,
    pub public_port: Option<u16>,
    pub protocol: Option<String>,
    pub ip: Option<String>,
}

/// 容器列表项
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub status: String,
    pub created: i64,
    pub ports: Vec<PortView>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerState {
    pub status: String,
    pub running: bool,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub exit_code: Option<i64>,
}

/// 单个容器详情
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContainerDetails {
    pub id: String,
    pub name: String,
    pub image: String,
    pub created: String,
    pub state: ContainerState,
    pub restart_policy: String,
    pub env: Vec<String>,
    pub mounts: Vec<serde_json::Value>,
    pub ports: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedContainer {
    pub id: String,
    pub warnings: Vec<String>,
    pub started: bool,
}

/// 镜像列表项
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSummary {
    pub id: String,
    pub tags: Vec<String>,
    pub size: i64,
    pub size_human: String,
    pub created: i64,
}

/// Docker 守护进程信息
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EngineInfo {
    pub containers: i64,
    pub running: i64,
    pub paused: i64,
    pub stopped: i64,
    pub images: i64,
    pub server_version: Option<String>,
    pub operating_system: Option<String>,
    pub kernel_version: Option<String>,
    pub cpus: i64,
    pub memory_total: i64,
    pub memory_total_human: String,
    pub driver: Option<String>,
}
