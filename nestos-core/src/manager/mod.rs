use crate::engine::ContainerEngine;
use crate::error::Result;
use crate::exec::CommandRunner;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use sysinfo::System;

mod bench;
mod control;
mod docker;
mod info;
mod logs;
mod services;
mod stats;

pub use logs::NO_LOGS_SENTINEL;
pub use stats::{compute_stats, format_bytes, ContainerStats};

/// 路径类配置
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// journalctl 不可用时回退读取的日志文件
    pub syslog_path: PathBuf,
    /// 磁盘基准测试临时文件所在目录
    pub bench_dir: PathBuf,
    /// 内存基准测试使用的 tmpfs 目录
    pub memory_dir: PathBuf,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            syslog_path: PathBuf::from("/var/log/syslog"),
            bench_dir: std::env::temp_dir(),
            memory_dir: PathBuf::from("/dev/shm"),
        }
    }
}

/// 主机管理器：采集主机信息、执行基准测试与系统控制命令、代理 Docker 操作。
///
/// 所有外部交互都经过 `CommandRunner` 与 `ContainerEngine`，每次调用重新查询，不做缓存。
#[derive(Debug, Clone)]
pub struct HostManager {
    runner: Arc<dyn CommandRunner>,
    engine: Arc<dyn ContainerEngine>,
    config: ManagerConfig,
    system: Arc<StdMutex<System>>,
}

impl HostManager {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        engine: Arc<dyn ContainerEngine>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            runner,
            engine,
            config,
            system: Arc::new(StdMutex::new(System::new())),
        }
    }

    /// 执行 sysinfo 操作；锁中毒时继续使用内部数据
    fn with_system<T>(&self, f: impl FnOnce(&mut System) -> T) -> T {
        let mut sys = self.system.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut sys)
    }

    /// 校验路径参数 id
    fn validate_ref(&self, id: &str) -> Result<()> {
        crate::container::validate_ref(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NestError;
    use crate::testing::{ScriptedRunner, StaticEngine};

    pub(crate) fn manager_with(runner: ScriptedRunner) -> HostManager {
        HostManager::new(
            Arc::new(runner),
            Arc::new(StaticEngine::default()),
            ManagerConfig::default(),
        )
    }

    #[test]
    fn default_config_paths() {
        let config = ManagerConfig::default();
        assert_eq!(config.syslog_path, PathBuf::from("/var/log/syslog"));
        assert_eq!(config.memory_dir, PathBuf::from("/dev/shm"));
    }

    #[test]
    fn rejects_invalid_refs() {
        let manager = manager_with(ScriptedRunner::new());
        assert!(manager.validate_ref("nginx:latest").is_ok());
        assert!(matches!(
            manager.validate_ref("bad id"),
            Err(NestError::InvalidInput(_))
        ));
    }
}
