//! Core library for the NestOS home server: host facts, benchmarks, system control, logs and Docker.

mod container;
mod engine;
mod error;
mod exec;
mod manager;
mod models;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use container::{
    validate_ref, ContainerDetails, ContainerSpec, ContainerState, ContainerSummary,
    CreatedContainer, EngineInfo, EnvVar, ImageSummary, PortMapping, PortView, PullRequest,
    RestartPolicyKind, VolumeMapping,
};
pub use engine::{create_config, ContainerEngine, DockerEngine, StatsSample};
pub use error::{NestError, Result};
pub use exec::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use manager::{
    compute_stats, format_bytes, ContainerStats, HostManager, ManagerConfig, NO_LOGS_SENTINEL,
};
pub use models::{
    CpuBenchmark, CpuInfo, DiskBenchmark, DiskInfo, DockerSummary, HostDetails, LoadInfo,
    MemoryBenchmark, MemoryInfo, NetworkInfo, PerformanceResult, ServiceUnit, SystemInfo,
    UpdateOutcome, UpdateStatus,
};
