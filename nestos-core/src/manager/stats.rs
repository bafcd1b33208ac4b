//! 容器资源统计：由 stats 接口返回的原始计数器推导出可读的百分比与流量。

use super::*;
use crate::engine::StatsSample;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::instrument;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// 单个容器的资源统计（已格式化）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContainerStats {
    pub id: String,
    pub name: String,
    /// 如 "80.00%"
    pub cpu_percent: String,
    pub memory_usage: String,
    pub memory_limit: String,
    pub memory_percent: String,
    /// "<rx> / <tx>"
    pub net_io: String,
    /// "<read> / <write>"
    pub block_io: String,
    pub pids: Option<u64>,
}

/// 字节数格式化：按 B/KB/MB/GB/TB 逐级除以 1024，直到小于 1024 或已到最大单位。
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    // 保留两位小数后可能进位到 1024.00
    if unit > 0 && unit < UNITS.len() - 1 && (value * 100.0).round() / 100.0 >= 1024.0 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}

/// CPU 使用率 = (cpuDelta / systemDelta) × onlineCPUs × 100
fn cpu_percent(sample: &StatsSample) -> f64 {
    let cpu_delta = sample.cpu_total as f64 - sample.precpu_total as f64;
    let system_delta = sample.system_total as f64 - sample.presystem_total as f64;
    if cpu_delta <= 0.0 || system_delta <= 0.0 {
        return 0.0;
    }
    (cpu_delta / system_delta) * sample.online_cpus.max(1) as f64 * 100.0
}

fn memory_percent(sample: &StatsSample) -> f64 {
    if sample.memory_limit == 0 {
        return 0.0;
    }
    sample.memory_usage as f64 / sample.memory_limit as f64 * 100.0
}

/// 由一次 stats 采样计算出格式化后的统计值
pub fn compute_stats(sample: &StatsSample) -> ContainerStats {
    let (rx, tx) = sample
        .networks
        .iter()
        .fold((0u64, 0u64), |(rx, tx), (r, t)| (rx + r, tx + t));

    let (read, write) = sample
        .blkio
        .iter()
        .fold((0u64, 0u64), |(read, write), (op, value)| {
            match op.to_ascii_lowercase().as_str() {
                "read" => (read + value, write),
                "write" => (read, write + value),
                _ => (read, write),
            }
        });

    ContainerStats {
        id: sample.id.clone(),
        name: sample.name.clone(),
        cpu_percent: format!("{:.2}%", cpu_percent(sample)),
        memory_usage: format_bytes(sample.memory_usage),
        memory_limit: format_bytes(sample.memory_limit),
        memory_percent: format!("{:.2}%", memory_percent(sample)),
        net_io: format!("{} / {}", format_bytes(rx), format_bytes(tx)),
        block_io: format!("{} / {}", format_bytes(read), format_bytes(write)),
        pids: sample.pids,
    }
}

impl HostManager {
    /// 所有运行中容器的资源统计（并发采样，任一失败则整体失败）
    #[instrument(skip(self))]
    pub async fn container_stats(&self) -> Result<Vec<ContainerStats>> {
        let running = self.engine.list_containers(false).await?;
        let samples = try_join_all(
            running
                .iter()
                .map(|c| self.engine.stats_sample(&c.id)),
        )
        .await?;
        Ok(samples
            .iter()
            .zip(running.iter())
            .map(|(sample, container)| {
                let mut stats = compute_stats(sample);
                if stats.id.is_empty() {
                    stats.id = container.id.clone();
                }
                if stats.name.is_empty() {
                    stats.name = container.name.clone();
                }
                stats
            })
            .collect())
    }
}
