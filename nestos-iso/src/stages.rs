//! 各构建阶段的具体步骤

use crate::config::INSTALL_PREFIX;
use crate::pipeline::Pipeline;
use anyhow::Context;
use std::path::Path;
use tracing::{debug, info};

/// 构建所需的主机工具
const REQUIRED_TOOLS: &[&str] = &["debootstrap", "mksquashfs", "grub-mkrescue", "xorriso"];

/// 镜像内安装的软件包（内核包按架构追加）
const PACKAGES: &[&str] = &[
    "live-boot",
    "systemd-sysv",
    "docker.io",
    "network-manager",
    "openssh-server",
    "sudo",
    "curl",
    "ca-certificates",
    "fio",
];

const API_UNIT: &str = "\
[Unit]
Description=NestOS API
After=network-online.target docker.service
Wants=network-online.target docker.service

[Service]
Type=simple
ExecStart=/opt/nestos/nestos-api
Environment=NESTOS_BIND=0.0.0.0:3001
Restart=always
RestartSec=5

[Install]
WantedBy=multi-user.target
";

const GRUB_CFG: &str = "\
set default=0
set timeout=5

menuentry \"NestOS\" {
    linux /live/vmlinuz boot=live quiet
    initrd /live/initrd
}
";

impl Pipeline {
    /// 检查工具并重建构建目录
    pub(crate) async fn setup(&self) -> anyhow::Result<()> {
        self.runner
            .run_checked("which", REQUIRED_TOOLS)
            .await
            .with_context(|| format!("missing build tools, need: {}", REQUIRED_TOOLS.join(" ")))?;

        let build_dir = &self.config.build_dir;
        if tokio::fs::try_exists(build_dir).await? {
            debug!(path = %build_dir.display(), "removing previous build");
            tokio::fs::remove_dir_all(build_dir)
                .await
                .with_context(|| format!("failed to remove {}", build_dir.display()))?;
        }
        for dir in [
            self.config.grub_dir(),
            self.config.live_dir(),
            self.config.chroot_dir(),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    pub(crate) async fn bootstrap(&self) -> anyhow::Result<()> {
        let arch = format!("--arch={}", self.config.arch);
        let chroot = path_arg(&self.config.chroot_dir());
        self.runner
            .run_checked(
                "debootstrap",
                &[
                    arch.as_str(),
                    "--variant=minbase",
                    self.config.suite.as_str(),
                    chroot.as_str(),
                    self.config.mirror.as_str(),
                ],
            )
            .await
            .context("debootstrap failed")?;
        Ok(())
    }

    /// 主机名、hosts、apt 源
    pub(crate) async fn configure(&self) -> anyhow::Result<()> {
        write_file(
            &self.config.in_chroot("etc/hostname"),
            &format!("{}\n", self.config.hostname),
        )
        .await?;
        write_file(&self.config.in_chroot("etc/hosts"), &self.config.hosts()).await?;
        write_file(
            &self.config.in_chroot("etc/apt/sources.list"),
            &self.config.sources_list(),
        )
        .await?;
        self.chroot(&["apt-get", "update"])
            .await
            .context("apt-get update in chroot failed")
    }

    pub(crate) async fn install_packages(&self) -> anyhow::Result<()> {
        let kernel = self.config.kernel_package();
        let mut args = vec![
            "env",
            "DEBIAN_FRONTEND=noninteractive",
            "apt-get",
            "install",
            "-y",
            "--no-install-recommends",
            kernel.as_str(),
        ];
        args.extend_from_slice(PACKAGES);
        self.chroot(&args)
            .await
            .context("package installation failed")
    }

    /// 复制组件、写入 systemd 单元并启用服务
    pub(crate) async fn install_components(&self) -> anyhow::Result<()> {
        let target = self.config.in_chroot(INSTALL_PREFIX);
        tokio::fs::create_dir_all(&target)
            .await
            .with_context(|| format!("failed to create {}", target.display()))?;

        match &self.config.components_dir {
            Some(source) => {
                // `dir/.` 复制目录内容而不是目录本身
                let from = path_arg(&source.join("."));
                let to = path_arg(&target);
                self.runner
                    .run_checked("cp", &["-a", from.as_str(), to.as_str()])
                    .await
                    .with_context(|| format!("failed to copy components from {}", source.display()))?;
            }
            None => info!("no components directory given, installing service unit only"),
        }

        write_file(
            &self.config.in_chroot("etc/systemd/system/nestos-api.service"),
            API_UNIT,
        )
        .await?;
        self.chroot(&["systemctl", "enable", "docker.service", "nestos-api.service"])
            .await
            .context("failed to enable services")
    }

    /// squashfs、内核与 initrd、grub 配置，最后生成 ISO
    pub(crate) async fn assemble(&self) -> anyhow::Result<()> {
        let chroot = path_arg(&self.config.chroot_dir());
        let squashfs = path_arg(&self.config.live_dir().join("filesystem.squashfs"));
        self.runner
            .run_checked(
                "mksquashfs",
                &[chroot.as_str(), squashfs.as_str(), "-e", "boot", "-noappend"],
            )
            .await
            .context("mksquashfs failed")?;

        let boot = self.config.in_chroot("boot");
        let live = self.config.live_dir();
        // 内核文件名带版本号，需要 shell 展开通配符
        let script = format!(
            "cp {boot}/vmlinuz-* {live}/vmlinuz && cp {boot}/initrd.img-* {live}/initrd",
            boot = shell_quote(&boot),
            live = shell_quote(&live),
        );
        self.runner
            .run_checked("sh", &["-c", script.as_str()])
            .await
            .context("failed to copy kernel and initrd")?;

        write_file(&self.config.grub_dir().join("grub.cfg"), GRUB_CFG).await?;

        let artifact = path_arg(&self.config.artifact());
        let iso_root = path_arg(&self.config.iso_root());
        self.runner
            .run_checked("grub-mkrescue", &["-o", artifact.as_str(), iso_root.as_str()])
            .await
            .context("grub-mkrescue failed")?;
        Ok(())
    }

    async fn chroot(&self, args: &[&str]) -> anyhow::Result<()> {
        let root = path_arg(&self.config.chroot_dir());
        let mut full = vec![root.as_str()];
        full.extend_from_slice(args);
        self.runner.run_checked("chroot", &full).await?;
        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.to_string_lossy().replace('\'', r"'\''"))
}

async fn write_file(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use nestos_core::testing::ScriptedRunner;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn pipeline(runner: Arc<ScriptedRunner>, dir: &TempDir) -> Pipeline {
        Pipeline::new(runner, test_config(&dir.path().join("build")))
    }

    #[tokio::test]
    async fn setup_recreates_build_tree() {
        let dir = TempDir::new().unwrap();
        let stale = dir.path().join("build/old.iso");
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, "old").unwrap();

        let runner = Arc::new(ScriptedRunner::new());
        pipeline(runner.clone(), &dir).setup().await.unwrap();
        assert!(!stale.exists());
        assert!(dir.path().join("build/iso/boot/grub").is_dir());
        assert!(dir.path().join("build/iso/live").is_dir());
        assert!(dir.path().join("build/chroot").is_dir());
        assert_eq!(
            runner.calls()[0],
            vec!["which", "debootstrap", "mksquashfs", "grub-mkrescue", "xorriso"]
        );
    }

    #[tokio::test]
    async fn bootstrap_arguments() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        pipeline(runner.clone(), &dir).bootstrap().await.unwrap();
        let chroot = dir.path().join("build/chroot").to_string_lossy().into_owned();
        assert_eq!(
            runner.calls()[0],
            vec![
                "debootstrap".to_string(),
                "--arch=amd64".into(),
                "--variant=minbase".into(),
                "bookworm".into(),
                chroot,
                "http://deb.debian.org/debian".into(),
            ]
        );
    }

    #[tokio::test]
    async fn configure_writes_system_files() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        pipeline(runner.clone(), &dir).configure().await.unwrap();
        let etc = dir.path().join("build/chroot/etc");
        assert_eq!(std::fs::read_to_string(etc.join("hostname")).unwrap(), "nestos\n");
        assert!(std::fs::read_to_string(etc.join("hosts")).unwrap().contains("nestos"));
        assert!(std::fs::read_to_string(etc.join("apt/sources.list"))
            .unwrap()
            .contains("bookworm main"));
        let call = &runner.calls()[0];
        assert_eq!(call[0], "chroot");
        assert_eq!(&call[2..], ["apt-get", "update"]);
    }

    #[tokio::test]
    async fn package_list_includes_kernel_and_docker() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        pipeline(runner.clone(), &dir).install_packages().await.unwrap();
        let call = &runner.calls()[0];
        assert!(call.iter().any(|a| a == "DEBIAN_FRONTEND=noninteractive"));
        assert!(call.iter().any(|a| a == "--no-install-recommends"));
        for pkg in ["linux-image-amd64", "live-boot", "docker.io", "fio"] {
            assert!(call.iter().any(|a| a == pkg), "missing {pkg}");
        }
    }

    #[tokio::test]
    async fn components_are_copied_when_given() {
        let dir = TempDir::new().unwrap();
        let components = dir.path().join("dist");
        std::fs::create_dir_all(&components).unwrap();
        let mut config = test_config(&dir.path().join("build"));
        config.components_dir = Some(components.clone());
        let runner = Arc::new(ScriptedRunner::new());
        Pipeline::new(runner.clone(), config)
            .install_components()
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0][0], "cp");
        assert_eq!(calls[0][1], "-a");
        assert!(calls[0][3].ends_with("chroot/opt/nestos"));
        assert_eq!(
            &calls[1][2..],
            ["systemctl", "enable", "docker.service", "nestos-api.service"]
        );
        let unit = dir
            .path()
            .join("build/chroot/etc/systemd/system/nestos-api.service");
        assert!(std::fs::read_to_string(unit)
            .unwrap()
            .contains("ExecStart=/opt/nestos/nestos-api"));
    }

    #[tokio::test]
    async fn kernel_copy_failure_stops_assembly() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ScriptedRunner::new().fail("sh", 1, "cp: cannot stat"));
        let err = pipeline(runner.clone(), &dir).assemble().await.unwrap_err();
        assert!(format!("{err:#}").contains("kernel and initrd"));
        assert_eq!(runner.programs(), vec!["mksquashfs", "sh"]);
    }

    #[test]
    fn shell_quoting() {
        assert_eq!(shell_quote(Path::new("/a b/c")), "'/a b/c'");
        assert_eq!(shell_quote(Path::new("/it's")), r"'/it'\''s'");
    }
}
