//! Docker Engine 接入层：`ContainerEngine` 定义能力，`DockerEngine` 基于 bollard 实现。

use crate::container::{
    ContainerDetails, ContainerSpec, ContainerState, ContainerSummary, EngineInfo, ImageSummary,
    PortView, RestartPolicyKind,
};
use crate::error::{NestError, Result};
use crate::manager::format_bytes;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, Stats, StatsOptions, StopContainerOptions,
};
use bollard::image::{CreateImageOptions, ListImagesOptions, RemoveImageOptions};
use bollard::models::{HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::{future, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// 连接超时（秒）
const DOCKER_TIMEOUT_SECS: u64 = 120;

/// 单次 stats 调用返回的原始计数器：当前样本与上一样本。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSample {
    pub id: String,
    pub name: String,
    pub cpu_total: u64,
    pub precpu_total: u64,
    pub system_total: u64,
    pub presystem_total: u64,
    pub online_cpus: u64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    /// 每个网卡的 (rx_bytes, tx_bytes)
    pub networks: Vec<(u64, u64)>,
    /// io_service_bytes_recursive 条目 (op, value)
    pub blkio: Vec<(String, u64)>,
    pub pids: Option<u64>,
}

/// 容器引擎能力。handler 只做校验和响应整形，其余全部委托给这里。
#[async_trait]
pub trait ContainerEngine: Send + Sync + std::fmt::Debug {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>>;
    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails>;
    /// 返回 (id, warnings)
    async fn create_container(&self, spec: &ContainerSpec) -> Result<(String, Vec<String>)>;
    async fn start_container(&self, id: &str) -> Result<()>;
    async fn stop_container(&self, id: &str) -> Result<()>;
    async fn remove_container(&self, id: &str) -> Result<()>;
    async fn list_images(&self) -> Result<Vec<ImageSummary>>;
    /// 等待整个拉取流结束后返回
    async fn pull_image(&self, image: &str, tag: &str) -> Result<()>;
    async fn remove_image(&self, id: &str) -> Result<()>;
    async fn info(&self) -> Result<EngineInfo>;
    async fn stats_sample(&self, id: &str) -> Result<StatsSample>;
}

/// bollard 实现
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// 连接 Docker：未指定 socket 时使用本地默认值（DOCKER_HOST 或 /var/run/docker.sock）。
    pub fn connect(socket: Option<&str>) -> Result<Self> {
        let docker = match socket {
            Some(path) => Docker::connect_with_socket(path, DOCKER_TIMEOUT_SECS, API_DEFAULT_VERSION)?,
            None => Docker::connect_with_local_defaults()?,
        };
        Ok(Self { docker })
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    #[instrument(skip(self))]
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;
        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: c.id.unwrap_or_default(),
                name: c
                    .names
                    .and_then(|names| names.into_iter().next())
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                state: c.state.unwrap_or_default(),
                status: c.status.unwrap_or_default(),
                created: c.created.unwrap_or_default(),
                ports: c
                    .ports
                    .unwrap_or_default()
                    .into_iter()
                    .map(|p| PortView {
                        private_port: p.private_port,
                        public_port: p.public_port,
                        protocol: p.typ.as_ref().and_then(enum_str),
                        ip: p.ip,
                    })
                    .collect(),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        let inspect = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await?;
        let value = serde_json::to_value(inspect)?;
        Ok(details_from_inspect(&value))
    }

    #[instrument(skip(self, spec), fields(image = %spec.image))]
    async fn create_container(&self, spec: &ContainerSpec) -> Result<(String, Vec<String>)> {
        let options = spec.name.as_ref().map(|name| CreateContainerOptions {
            name: name.clone(),
            platform: None,
        });
        let created = self
            .docker
            .create_container(options, create_config(spec))
            .await?;
        Ok((created.id, created.warnings))
    }

    #[instrument(skip(self))]
    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop_container(&self, id: &str) -> Result<()> {
        self.docker
            .stop_container(id, None::<StopContainerOptions>)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_container(&self, id: &str) -> Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker.remove_container(id, Some(options)).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        let options = ListImagesOptions::<String> {
            all: false,
            ..Default::default()
        };
        let images = self.docker.list_images(Some(options)).await?;
        images
            .into_iter()
            .map(|image| -> Result<ImageSummary> {
                Ok(image_from_value(&serde_json::to_value(image)?))
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn pull_image(&self, image: &str, tag: &str) -> Result<()> {
        let options = CreateImageOptions {
            from_image: image.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };
        // 进度事件只记录日志，不回传给调用方
        self.docker
            .create_image(Some(options), None, None)
            .try_for_each(|info| {
                debug!(status = ?info.status, progress = ?info.progress, "pull progress");
                future::ready(Ok(()))
            })
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_image(&self, id: &str) -> Result<()> {
        self.docker
            .remove_image(id, None::<RemoveImageOptions>, None)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn info(&self) -> Result<EngineInfo> {
        let info = self.docker.info().await?;
        let memory_total = info.mem_total.unwrap_or_default();
        Ok(EngineInfo {
            containers: info.containers.unwrap_or_default(),
            running: info.containers_running.unwrap_or_default(),
            paused: info.containers_paused.unwrap_or_default(),
            stopped: info.containers_stopped.unwrap_or_default(),
            images: info.images.unwrap_or_default(),
            server_version: info.server_version,
            operating_system: info.operating_system,
            kernel_version: info.kernel_version,
            cpus: info.ncpu.unwrap_or_default(),
            memory_total,
            memory_total_human: format_bytes(memory_total.max(0) as u64),
            driver: info.driver,
        })
    }

    #[instrument(skip(self))]
    async fn stats_sample(&self, id: &str) -> Result<StatsSample> {
        // stream=false 且 one_shot=false：守护进程等待两次采样，precpu_stats 有值
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let samples: Vec<Stats> = self
            .docker
            .stats(id, Some(options))
            .take(1)
            .try_collect()
            .await?;
        let stats = samples
            .into_iter()
            .next()
            .ok_or_else(|| NestError::Other(format!("no stats returned for {id}")))?;
        Ok(sample_from_stats(stats))
    }
}

fn sample_from_stats(stats: Stats) -> StatsSample {
    let online_cpus = stats
        .cpu_stats
        .online_cpus
        .filter(|n| *n > 0)
        .or_else(|| {
            stats
                .cpu_stats
                .cpu_usage
                .percpu_usage
                .as_ref()
                .map(|v| v.len() as u64)
                .filter(|n| *n > 0)
        })
        .unwrap_or(1);

    StatsSample {
        id: stats.id,
        name: stats.name.trim_start_matches('/').to_string(),
        cpu_total: stats.cpu_stats.cpu_usage.total_usage,
        precpu_total: stats.precpu_stats.cpu_usage.total_usage,
        system_total: stats.cpu_stats.system_cpu_usage.unwrap_or_default(),
        presystem_total: stats.precpu_stats.system_cpu_usage.unwrap_or_default(),
        online_cpus,
        memory_usage: stats.memory_stats.usage.unwrap_or_default(),
        memory_limit: stats.memory_stats.limit.unwrap_or_default(),
        networks: stats
            .networks
            .unwrap_or_default()
            .into_values()
            .map(|n| (n.rx_bytes, n.tx_bytes))
            .collect(),
        blkio: stats
            .blkio_stats
            .io_service_bytes_recursive
            .unwrap_or_default()
            .into_iter()
            .map(|e| (e.op, e.value))
            .collect(),
        pids: stats.pids_stats.current,
    }
}

/// 把创建请求映射为 Docker create 参数。
pub fn create_config(spec: &ContainerSpec) -> Config<String> {
    let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    for port in &spec.ports {
        let key = format!("{}/{}", port.container, port.protocol);
        exposed_ports.insert(key.clone(), HashMap::new());
        let binding = PortBinding {
            host_ip: None,
            host_port: Some(port.host.to_string()),
        };
        port_bindings
            .entry(key)
            .or_insert_with(|| Some(Vec::new()))
            .get_or_insert_with(Vec::new)
            .push(binding);
    }

    let restart_name = match spec.restart_policy {
        RestartPolicyKind::No => RestartPolicyNameEnum::NO,
        RestartPolicyKind::Always => RestartPolicyNameEnum::ALWAYS,
        RestartPolicyKind::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
        RestartPolicyKind::OnFailure => RestartPolicyNameEnum::ON_FAILURE,
    };

    let binds = spec.binds();
    let env = spec.env_pairs();
    let host_config = HostConfig {
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        binds: (!binds.is_empty()).then_some(binds),
        restart_policy: Some(RestartPolicy {
            name: Some(restart_name),
            maximum_retry_count: None,
        }),
        ..Default::default()
    };

    Config {
        image: Some(spec.image.clone()),
        env: (!env.is_empty()).then_some(env),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        host_config: Some(host_config),
        ..Default::default()
    }
}

/// 枚举值按其 serde 表示转成字符串（如 PortTypeEnum::TCP -> "tcp"）
fn enum_str<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_value(value).ok()? {
        Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

fn str_at(value: &Value, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// 从 inspect 的 JSON 中挑出面板需要的字段
pub(crate) fn details_from_inspect(value: &Value) -> ContainerDetails {
    let opt_str = |pointer: &str| {
        value
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };
    ContainerDetails {
        id: str_at(value, "/Id"),
        name: str_at(value, "/Name").trim_start_matches('/').to_string(),
        image: str_at(value, "/Config/Image"),
        created: str_at(value, "/Created"),
        state: ContainerState {
            status: str_at(value, "/State/Status"),
            running: value
                .pointer("/State/Running")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            started_at: opt_str("/State/StartedAt"),
            finished_at: opt_str("/State/FinishedAt"),
            exit_code: value.pointer("/State/ExitCode").and_then(Value::as_i64),
        },
        restart_policy: str_at(value, "/HostConfig/RestartPolicy/Name"),
        env: value
            .pointer("/Config/Env")
            .and_then(Value::as_array)
            .map(|vars| {
                vars.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        mounts: value
            .pointer("/Mounts")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        ports: value
            .pointer("/NetworkSettings/Ports")
            .cloned()
            .unwrap_or(Value::Null),
    }
}

pub(crate) fn image_from_value(value: &Value) -> ImageSummary {
    let size = value.pointer("/Size").and_then(Value::as_i64).unwrap_or_default();
    ImageSummary {
        id: str_at(value, "/Id"),
        tags: value
            .pointer("/RepoTags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        size,
        size_human: format_bytes(size.max(0) as u64),
        created: value.pointer("/Created").and_then(Value::as_i64).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{EnvVar, PortMapping, VolumeMapping};
    use serde_json::json;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            image: "nginx:latest".into(),
            name: Some("web".into()),
            ports: vec![],
            volumes: vec![],
            env: vec![],
            restart_policy: RestartPolicyKind::No,
            start: true,
        }
    }

    #[test]
    fn port_binding_maps_container_port_to_host_port() {
        let mut s = spec();
        s.ports.push(PortMapping {
            container: 80,
            host: 8080,
            protocol: "tcp".into(),
        });
        let config = create_config(&s);
        let host_config = config.host_config.unwrap();
        let bindings = host_config.port_bindings.unwrap();
        let binding = bindings["80/tcp"].as_ref().unwrap();
        assert_eq!(binding.len(), 1);
        assert_eq!(binding[0].host_port.as_deref(), Some("8080"));
        assert!(config.exposed_ports.unwrap().contains_key("80/tcp"));
    }

    #[test]
    fn same_container_port_binds_multiple_hosts() {
        let mut s = spec();
        s.ports.push(PortMapping { container: 53, host: 53, protocol: "udp".into() });
        s.ports.push(PortMapping { container: 53, host: 5353, protocol: "udp".into() });
        let bindings = create_config(&s).host_config.unwrap().port_bindings.unwrap();
        let hosts: Vec<_> = bindings["53/udp"]
            .as_ref()
            .unwrap()
            .iter()
            .map(|b| b.host_port.clone().unwrap())
            .collect();
        assert_eq!(hosts, vec!["53", "5353"]);
    }

    #[test]
    fn config_carries_env_binds_and_restart_policy() {
        let mut s = spec();
        s.env.push(EnvVar { key: "TZ".into(), value: "UTC".into() });
        s.volumes.push(VolumeMapping { host: "/srv".into(), container: "/data".into(), read_only: false });
        s.restart_policy = RestartPolicyKind::UnlessStopped;
        let config = create_config(&s);
        assert_eq!(config.image.as_deref(), Some("nginx:latest"));
        assert_eq!(config.env, Some(vec!["TZ=UTC".to_string()]));
        let host_config = config.host_config.unwrap();
        assert_eq!(host_config.binds, Some(vec!["/srv:/data".to_string()]));
        assert_eq!(
            host_config.restart_policy.unwrap().name,
            Some(RestartPolicyNameEnum::UNLESS_STOPPED)
        );
        assert!(host_config.port_bindings.is_none());
    }

    #[test]
    fn inspect_reshaping() {
        let value = json!({
            "Id": "abc123",
            "Name": "/web",
            "Created": "2024-01-01T00:00:00Z",
            "Config": { "Image": "nginx:latest", "Env": ["TZ=UTC"] },
            "State": { "Status": "running", "Running": true, "StartedAt": "2024-01-01T00:00:01Z", "FinishedAt": "", "ExitCode": 0 },
            "HostConfig": { "RestartPolicy": { "Name": "always" } },
            "Mounts": [{ "Source": "/srv", "Destination": "/data" }],
            "NetworkSettings": { "Ports": { "80/tcp": [{ "HostIp": "0.0.0.0", "HostPort": "8080" }] } }
        });
        let details = details_from_inspect(&value);
        assert_eq!(details.name, "web");
        assert_eq!(details.image, "nginx:latest");
        assert!(details.state.running);
        assert_eq!(details.state.finished_at, None);
        assert_eq!(details.restart_policy, "always");
        assert_eq!(details.env, vec!["TZ=UTC"]);
        assert_eq!(details.mounts.len(), 1);
        assert_eq!(details.ports["80/tcp"][0]["HostPort"], "8080");
    }

    #[test]
    fn image_reshaping() {
        let value = json!({
            "Id": "sha256:1",
            "RepoTags": ["nginx:latest"],
            "Size": 1536,
            "Created": 1700000000
        });
        let image = image_from_value(&value);
        assert_eq!(image.tags, vec!["nginx:latest"]);
        assert_eq!(image.size_human, "1.50 KB");
        assert_eq!(image.created, 1700000000);
    }
}
