mod config;
mod pipeline;
mod stages;

use clap::{Parser, Subcommand};
use config::BuildConfig;
use nestos_core::SystemCommandRunner;
use pipeline::{BuildReport, Pipeline, Stage, StageError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Builds the bootable NestOS live ISO.
#[derive(Parser)]
#[command(name = "nestos-iso", author, version, about = "NestOS ISO builder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 依次执行全部构建阶段（需要 root 权限）
    Build(BuildArgs),
    /// 列出构建阶段
    Stages,
}

#[derive(clap::Args)]
struct BuildArgs {
    /// 构建目录（每次构建前会被清空）
    #[arg(long, env = "NESTOS_BUILD_DIR", default_value = "build")]
    build_dir: PathBuf,
    /// Debian 发行版代号
    #[arg(long, env = "NESTOS_SUITE", default_value = "bookworm")]
    suite: String,
    #[arg(long, env = "NESTOS_MIRROR", default_value = "http://deb.debian.org/debian")]
    mirror: String,
    #[arg(long, env = "NESTOS_ARCH", default_value = "amd64")]
    arch: String,
    #[arg(long, env = "NESTOS_HOSTNAME", default_value = "nestos")]
    hostname: String,
    /// 预先编译好的组件目录（nestos-api 等），复制到镜像的 /opt/nestos
    #[arg(long, env = "NESTOS_COMPONENTS_DIR")]
    components_dir: Option<PathBuf>,
}

impl From<BuildArgs> for BuildConfig {
    fn from(args: BuildArgs) -> Self {
        BuildConfig {
            build_dir: args.build_dir,
            suite: args.suite,
            mirror: args.mirror,
            arch: args.arch,
            hostname: args.hostname,
            components_dir: args.components_dir,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // 加载 .env 文件（如果存在），忽略错误
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Stages => {
            for (idx, stage) in Stage::ALL.iter().enumerate() {
                println!("{}. {}", idx + 1, stage);
            }
            ExitCode::SUCCESS
        }
        Commands::Build(args) => {
            let pipeline = Pipeline::new(Arc::new(SystemCommandRunner), args.into());
            ExitCode::from(finish_build(pipeline.run().await))
        }
    }
}

/// 输出构建结果并返回进程退出码：成功 0，任一阶段失败 1
fn finish_build(result: Result<BuildReport, StageError>) -> u8 {
    match result {
        Ok(report) => {
            println!("{report}");
            0
        }
        Err(err) => {
            tracing::error!(stage = %err.stage, "{err}");
            1
        }
    }
}

fn init_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
