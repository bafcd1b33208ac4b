//! 电源控制与系统更新

use super::*;
use crate::models::{UpdateOutcome, UpdateStatus};
use tracing::{info, instrument, warn};

const UPDATE_SCRIPT: &str = "apt-get update && apt-get upgrade -y";

impl HostManager {
    /// 立即重启。命令返回成功后即响应，不等待系统真正下线。
    #[instrument(skip(self))]
    pub async fn reboot(&self) -> Result<&'static str> {
        self.runner.run_checked("shutdown", &["-r", "now"]).await?;
        info!("reboot scheduled");
        Ok("rebooting")
    }

    /// 立即关机
    #[instrument(skip(self))]
    pub async fn shutdown(&self) -> Result<&'static str> {
        self.runner.run_checked("shutdown", &["-h", "now"]).await?;
        info!("shutdown scheduled");
        Ok("shutting down")
    }

    /// 运行 apt 更新。更新失败仍返回结果（status=failed），只有无法启动 shell 时才报错。
    #[instrument(skip(self))]
    pub async fn update(&self) -> Result<UpdateOutcome> {
        let output = self.runner.run("sh", &["-c", UPDATE_SCRIPT]).await?;
        let status = if output.success() {
            UpdateStatus::Success
        } else {
            warn!(exit_code = ?output.exit_code, "system update failed");
            UpdateStatus::Failed
        };
        Ok(UpdateOutcome {
            status,
            output: output.stdout,
            errors: output.stderr,
        })
    }
}
