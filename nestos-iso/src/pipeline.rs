//! 构建流水线：按固定顺序执行各阶段，遇到第一个失败立即中止，不做清理。

use crate::config::BuildConfig;
use nestos_core::CommandRunner;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Bootstrap,
    Configure,
    Packages,
    Components,
    Assemble,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Setup,
        Stage::Bootstrap,
        Stage::Configure,
        Stage::Packages,
        Stage::Components,
        Stage::Assemble,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Setup => "environment setup",
            Stage::Bootstrap => "base-system bootstrap",
            Stage::Configure => "system configuration",
            Stage::Packages => "package installation",
            Stage::Components => "component installation",
            Stage::Assemble => "ISO assembly",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {source:#}")]
pub struct StageError {
    pub stage: Stage,
    pub source: anyhow::Error,
}

/// 成功构建的结果
#[derive(Debug)]
pub struct BuildReport {
    pub artifact: PathBuf,
    pub durations: Vec<(Stage, Duration)>,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ISO written to {}", self.artifact.display())?;
        for (stage, elapsed) in &self.durations {
            writeln!(f, "  {:<24} {:>8.1}s", stage.name(), elapsed.as_secs_f64())?;
        }
        let total: Duration = self.durations.iter().map(|(_, d)| *d).sum();
        write!(f, "  {:<24} {:>8.1}s", "total", total.as_secs_f64())
    }
}

pub struct Pipeline {
    pub(crate) runner: Arc<dyn CommandRunner>,
    pub(crate) config: BuildConfig,
}

impl Pipeline {
    pub fn new(runner: Arc<dyn CommandRunner>, config: BuildConfig) -> Self {
        Self { runner, config }
    }

    /// 依次执行所有阶段
    pub async fn run(&self) -> Result<BuildReport, StageError> {
        let mut durations = Vec::with_capacity(Stage::ALL.len());
        for (idx, stage) in Stage::ALL.into_iter().enumerate() {
            info!("[{}/{}] {}", idx + 1, Stage::ALL.len(), stage);
            let started = Instant::now();
            if let Err(source) = self.run_stage(stage).await {
                error!(%stage, error = %format!("{source:#}"), "build aborted");
                return Err(StageError { stage, source });
            }
            durations.push((stage, started.elapsed()));
        }
        let artifact = self.config.artifact();
        info!(artifact = %artifact.display(), "build finished");
        Ok(BuildReport {
            artifact,
            durations,
        })
    }

    async fn run_stage(&self, stage: Stage) -> anyhow::Result<()> {
        match stage {
            Stage::Setup => self.setup().await,
            Stage::Bootstrap => self.bootstrap().await,
            Stage::Configure => self.configure().await,
            Stage::Packages => self.install_packages().await,
            Stage::Components => self.install_components().await,
            Stage::Assemble => self.assemble().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use nestos_core::testing::ScriptedRunner;
    use tempfile::TempDir;

    fn pipeline(runner: Arc<ScriptedRunner>, dir: &TempDir) -> Pipeline {
        Pipeline::new(runner, test_config(&dir.path().join("build")))
    }

    #[tokio::test]
    async fn successful_build_runs_every_stage_in_order() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let report = pipeline(runner.clone(), &dir).run().await.unwrap();

        let stages: Vec<Stage> = report.durations.iter().map(|(s, _)| *s).collect();
        assert_eq!(stages, Stage::ALL.to_vec());
        assert_eq!(report.artifact, dir.path().join("build/nestos.iso"));
        assert_eq!(
            runner.programs(),
            vec![
                "which",
                "debootstrap",
                "chroot",
                "chroot",
                "chroot",
                "mksquashfs",
                "sh",
                "grub-mkrescue"
            ]
        );
        assert!(report.to_string().contains("ISO written to"));
    }

    #[tokio::test]
    async fn failing_stage_aborts_the_build() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(
            ScriptedRunner::new().fail("debootstrap", 1, "E: Failed getting release file"),
        );
        let err = pipeline(runner.clone(), &dir).run().await.unwrap_err();

        assert_eq!(err.stage, Stage::Bootstrap);
        assert!(err.to_string().contains("Failed getting release file"));
        // 后续阶段一个命令都不执行
        assert_eq!(runner.programs(), vec!["which", "debootstrap"]);
        assert!(!dir.path().join("build/chroot/etc/hostname").exists());
    }

    #[tokio::test]
    async fn missing_tools_fail_setup() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new().fail("which", 1, ""));
        let err = pipeline(runner.clone(), &dir).run().await.unwrap_err();
        assert_eq!(err.stage, Stage::Setup);
        assert_eq!(runner.programs(), vec!["which"]);
        assert!(!dir.path().join("build").exists());
    }

    #[tokio::test]
    async fn late_failure_keeps_earlier_output() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new().fail("grub-mkrescue", 1, "xorriso missing"));
        let err = pipeline(runner, &dir).run().await.unwrap_err();
        assert_eq!(err.stage, Stage::Assemble);
        // 不做清理
        assert!(dir.path().join("build/iso/boot/grub/grub.cfg").exists());
    }

    #[test]
    fn stage_listing() {
        let names: Vec<&str> = Stage::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), 6);
        assert_eq!(names[0], "environment setup");
        assert_eq!(names[5], "ISO assembly");
    }
}
