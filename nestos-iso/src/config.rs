use std::path::{Path, PathBuf};

/// 镜像内 API 服务安装位置
pub const INSTALL_PREFIX: &str = "opt/nestos";

/// ISO 构建参数
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub build_dir: PathBuf,
    pub suite: String,
    pub mirror: String,
    pub arch: String,
    pub hostname: String,
    pub components_dir: Option<PathBuf>,
}

impl BuildConfig {
    /// debootstrap 目标根文件系统
    pub fn chroot_dir(&self) -> PathBuf {
        self.build_dir.join("chroot")
    }

    /// ISO 内容根目录
    pub fn iso_root(&self) -> PathBuf {
        self.build_dir.join("iso")
    }

    pub fn live_dir(&self) -> PathBuf {
        self.iso_root().join("live")
    }

    pub fn grub_dir(&self) -> PathBuf {
        self.iso_root().join("boot").join("grub")
    }

    pub fn artifact(&self) -> PathBuf {
        self.build_dir.join("nestos.iso")
    }

    /// chroot 内的路径
    pub fn in_chroot(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.chroot_dir().join(relative)
    }

    /// 与架构匹配的内核元包
    pub fn kernel_package(&self) -> String {
        format!("linux-image-{}", self.arch)
    }

    pub fn sources_list(&self) -> String {
        format!(
            "deb {mirror} {suite} main\ndeb {mirror} {suite}-updates main\n",
            mirror = self.mirror,
            suite = self.suite
        )
    }

    pub fn hosts(&self) -> String {
        format!(
            "127.0.0.1\tlocalhost\n127.0.1.1\t{}\n::1\tlocalhost ip6-localhost ip6-loopback\n",
            self.hostname
        )
    }
}

#[cfg(test)]
pub(crate) fn test_config(build_dir: &Path) -> BuildConfig {
    BuildConfig {
        build_dir: build_dir.to_path_buf(),
        suite: "bookworm".into(),
        mirror: "http://deb.debian.org/debian".into(),
        arch: "amd64".into(),
        hostname: "nestos".into(),
        components_dir: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_paths() {
        let config = test_config(Path::new("/tmp/b"));
        assert_eq!(config.chroot_dir(), PathBuf::from("/tmp/b/chroot"));
        assert_eq!(config.live_dir(), PathBuf::from("/tmp/b/iso/live"));
        assert_eq!(config.grub_dir(), PathBuf::from("/tmp/b/iso/boot/grub"));
        assert_eq!(config.artifact(), PathBuf::from("/tmp/b/nestos.iso"));
        assert_eq!(config.kernel_package(), "linux-image-amd64");
    }

    #[test]
    fn rendered_files() {
        let config = test_config(Path::new("/tmp/b"));
        assert!(config
            .sources_list()
            .starts_with("deb http://deb.debian.org/debian bookworm main\n"));
        assert!(config.hosts().contains("127.0.1.1\tnestos"));
    }
}
