//! 主机信息采集

use super::*;
use crate::models::{
    CpuInfo, DiskInfo, DockerSummary, HostDetails, LoadInfo, MemoryInfo, NetworkInfo, SystemInfo,
};
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, Networks, RefreshKind};
use tracing::instrument;

impl HostManager {
    /// 获取主机信息；`detailed` 为 true 时并发追加负载、服务、Docker 等较慢的查询。
    ///
    /// 详细查询使用 join 汇合，任一失败则整个请求失败，不返回部分结果。
    #[instrument(skip(self))]
    pub async fn system_info(&self, detailed: bool) -> Result<SystemInfo> {
        let (cpu, memory) = self.with_system(|sys| {
            sys.refresh_specifics(
                RefreshKind::new()
                    .with_cpu(CpuRefreshKind::everything())
                    .with_memory(MemoryRefreshKind::everything()),
            );
            (cpu_info(sys), memory_info(sys))
        });

        let mut info = SystemInfo {
            hostname: System::host_name().unwrap_or_default(),
            platform: System::name().unwrap_or_else(|| std::env::consts::OS.to_string()),
            cpu,
            memory,
            system: None,
            load: None,
            services: None,
            docker: None,
        };

        if detailed {
            let (system, load, services, docker) = tokio::try_join!(
                self.host_details(),
                self.load_sample(),
                self.list_services(),
                self.docker_summary(),
            )?;
            info.system = Some(system);
            info.load = Some(load);
            info.services = Some(services);
            info.docker = Some(docker);
        }

        Ok(info)
    }

    /// CPU 负载采样：两次刷新之间至少间隔 sysinfo 要求的最小时长。
    ///
    /// 每次采样使用独立的 `System`，并发请求不会互相刷新计数器。
    pub async fn load_sample(&self) -> Result<LoadInfo> {
        let mut sys = System::new();
        sys.refresh_cpu_specifics(CpuRefreshKind::new().with_cpu_usage());
        tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
        sys.refresh_cpu_specifics(CpuRefreshKind::new().with_cpu_usage());
        let current_load = sys.global_cpu_info().cpu_usage();
        let cpus = sys.cpus().iter().map(|c| c.cpu_usage()).collect::<Vec<_>>();
        let avg = System::load_average();
        Ok(LoadInfo {
            avg_load: [avg.one, avg.five, avg.fifteen],
            current_load,
            cpus,
        })
    }

    async fn host_details(&self) -> Result<HostDetails> {
        let disks = Disks::new_with_refreshed_list()
            .iter()
            .map(|d| DiskInfo {
                name: d.name().to_string_lossy().to_string(),
                mount_point: d.mount_point().to_string_lossy().to_string(),
                kind: format!("{:?}", d.kind()),
                total: d.total_space(),
                available: d.available_space(),
            })
            .collect();

        let networks = Networks::new_with_refreshed_list()
            .iter()
            .map(|(name, data)| NetworkInfo {
                interface: name.to_string(),
                received: data.total_received(),
                transmitted: data.total_transmitted(),
            })
            .collect();

        let boot_time = chrono::DateTime::from_timestamp(System::boot_time() as i64, 0)
            .map(|dt| dt.to_rfc3339());

        Ok(HostDetails {
            os_version: System::os_version(),
            long_os_version: System::long_os_version(),
            kernel_version: System::kernel_version(),
            arch: std::env::consts::ARCH.to_string(),
            uptime_secs: System::uptime(),
            boot_time,
            disks,
            networks,
        })
    }

    async fn docker_summary(&self) -> Result<DockerSummary> {
        let info = self.engine.info().await?;
        Ok(DockerSummary {
            containers: info.containers,
            running: info.running,
            paused: info.paused,
            stopped: info.stopped,
            images: info.images,
            server_version: info.server_version,
        })
    }
}

fn cpu_info(sys: &System) -> CpuInfo {
    let first = sys.cpus().first();
    CpuInfo {
        brand: first.map(|c| c.brand().trim().to_string()).unwrap_or_default(),
        vendor: first.map(|c| c.vendor_id().to_string()).unwrap_or_default(),
        cores: sys.cpus().len(),
        frequency_mhz: first.map(|c| c.frequency()).unwrap_or_default(),
    }
}

fn memory_info(sys: &System) -> MemoryInfo {
    MemoryInfo {
        total: sys.total_memory(),
        used: sys.used_memory(),
        free: sys.free_memory(),
        available: sys.available_memory(),
        swap_total: sys.total_swap(),
        swap_used: sys.used_swap(),
    }
}
