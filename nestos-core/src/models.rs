use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// 主机信息；基础模式下 system/load/services/docker 为 None 且不序列化。
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub platform: String,
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub system: Option<HostDetails>,
    pub load: Option<LoadInfo>,
    pub services: Option<Vec<ServiceUnit>>,
    pub docker: Option<DockerSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuInfo {
    pub brand: String,
    pub vendor: String,
    /// 逻辑核心数
    pub cores: usize,
    pub frequency_mhz: u64,
}

/// 内存快照 (bytes)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub available: u64,
    pub swap_total: u64,
    pub swap_used: u64,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDetails {
    pub os_version: Option<String>,
    pub long_os_version: Option<String>,
    pub kernel_version: Option<String>,
    pub arch: String,
    pub uptime_secs: u64,
    /// RFC3339
    pub boot_time: Option<String>,
    pub disks: Vec<DiskInfo>,
    pub networks: Vec<NetworkInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskInfo {
    pub name: String,
    pub mount_point: String,
    pub kind: String,
    pub total: u64,
    pub available: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub interface: String,
    pub received: u64,
    pub transmitted: u64,
}

/// CPU 负载采样
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadInfo {
    /// 1/5/15 分钟平均负载
    pub avg_load: [f64; 3],
    /// 全局 CPU 使用率 (0-100)
    pub current_load: f32,
    /// 每个核心的使用率 (0-100)
    pub cpus: Vec<f32>,
}

/// systemd 服务单元
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceUnit {
    pub name: String,
    pub load: String,
    pub active: String,
    pub sub: String,
    pub description: String,
    pub running: bool,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DockerSummary {
    pub containers: i64,
    pub running: i64,
    pub paused: i64,
    pub stopped: i64,
    pub images: i64,
    pub server_version: Option<String>,
}

/// 性能测试结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceResult {
    pub cpu: CpuBenchmark,
    pub load: LoadInfo,
    pub memory: MemoryBenchmark,
    pub disk: DiskBenchmark,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuBenchmark {
    pub iterations: u64,
    pub duration_ms: f64,
    pub ops_per_sec: f64,
}

/// 内存吞吐 (GB/s)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryBenchmark {
    pub write_speed: f64,
    pub read_speed: f64,
}

/// 磁盘吞吐 (GB/s) 与随机读 IOPS
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiskBenchmark {
    pub write_speed: f64,
    pub read_speed: f64,
    pub iops: f64,
}

/// 系统更新结果：stdout/stderr 原样返回
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub status: UpdateStatus,
    pub output: String,
    pub errors: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Success,
    Failed,
}
