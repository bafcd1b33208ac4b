//! 性能测试：CPU 计算循环、负载采样、dd 吞吐与 fio 随机读 IOPS。

use super::*;
use crate::error::NestError;
use crate::models::{CpuBenchmark, DiskBenchmark, MemoryBenchmark, PerformanceResult};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{debug, instrument};

/// CPU 循环次数
const CPU_ITERATIONS: u64 = 10_000_000;
/// dd 块大小与块数：1000 × 1MB
const DD_BLOCK_SIZE: &str = "bs=1M";
const DD_COUNT: &str = "count=1000";
/// fio 固定运行时长（秒）
const FIO_RUNTIME_SECS: u32 = 10;

impl HostManager {
    /// 运行全部测量并合并结果。整个过程可能超过 10 秒，期间不做超时控制。
    #[instrument(skip(self))]
    pub async fn run_performance_test(&self) -> Result<PerformanceResult> {
        let (cpu, load, memory, disk) = tokio::try_join!(
            cpu_benchmark(),
            self.load_sample(),
            self.memory_benchmark(),
            self.disk_benchmark(),
        )?;
        Ok(PerformanceResult {
            cpu,
            load,
            memory,
            disk,
        })
    }

    /// tmpfs 上的 dd 写入/读取
    async fn memory_benchmark(&self) -> Result<MemoryBenchmark> {
        let path = scratch_file(&self.config.memory_dir, "mem");
        let result = async {
            let write_speed = self.dd_write(&path, false).await?;
            let read_speed = self.dd_read(&path, false).await?;
            Ok::<_, NestError>(MemoryBenchmark {
                write_speed,
                read_speed,
            })
        }
        .await;
        remove_scratch(&path).await;
        result
    }

    /// 磁盘 direct I/O 的 dd 写入/读取 + fio 随机读
    async fn disk_benchmark(&self) -> Result<DiskBenchmark> {
        let path = scratch_file(&self.config.bench_dir, "disk");
        let result = async {
            let write_speed = self.dd_write(&path, true).await?;
            let read_speed = self.dd_read(&path, true).await?;
            let iops = self.fio_random_read(&path).await?;
            Ok::<_, NestError>(DiskBenchmark {
                write_speed,
                read_speed,
                iops,
            })
        }
        .await;
        remove_scratch(&path).await;
        result
    }

    async fn dd_write(&self, path: &Path, direct: bool) -> Result<f64> {
        let of = format!("of={}", path.display());
        let mut args = vec!["if=/dev/zero", of.as_str(), DD_BLOCK_SIZE, DD_COUNT];
        if direct {
            args.push("oflag=direct");
        } else {
            args.push("conv=fdatasync");
        }
        let output = self.runner.run_checked("dd", &args).await?;
        // dd 的统计信息输出在 stderr
        Ok(parse_throughput(&format!("{}\n{}", output.stdout, output.stderr)))
    }

    async fn dd_read(&self, path: &Path, direct: bool) -> Result<f64> {
        let input = format!("if={}", path.display());
        let mut args = vec![input.as_str(), "of=/dev/null", DD_BLOCK_SIZE];
        if direct {
            args.push("iflag=direct");
        }
        let output = self.runner.run_checked("dd", &args).await?;
        Ok(parse_throughput(&format!("{}\n{}", output.stdout, output.stderr)))
    }

    async fn fio_random_read(&self, path: &Path) -> Result<f64> {
        let filename = format!("--filename={}", path.display());
        let runtime = format!("--runtime={FIO_RUNTIME_SECS}");
        let output = self
            .runner
            .run_checked(
                "fio",
                &[
                    "--name=nestos-randread",
                    filename.as_str(),
                    "--rw=randread",
                    "--bs=4k",
                    "--iodepth=32",
                    "--ioengine=libaio",
                    "--direct=1",
                    "--size=256M",
                    runtime.as_str(),
                    "--time_based",
                    "--output-format=json",
                ],
            )
            .await?;
        Ok(parse_fio_iops(&output.stdout))
    }
}

/// 在阻塞线程中计时执行 sqrt 累加循环
async fn cpu_benchmark() -> Result<CpuBenchmark> {
    let benchmark = tokio::task::spawn_blocking(|| {
        let start = Instant::now();
        let mut acc = 0f64;
        for i in 0..CPU_ITERATIONS {
            acc += std::hint::black_box(i as f64).sqrt();
        }
        std::hint::black_box(acc);
        let elapsed = start.elapsed();
        let duration_ms = elapsed.as_secs_f64() * 1000.0;
        let ops_per_sec = if elapsed.as_secs_f64() > 0.0 {
            CPU_ITERATIONS as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        CpuBenchmark {
            iterations: CPU_ITERATIONS,
            duration_ms,
            ops_per_sec,
        }
    })
    .await?;
    debug!(duration_ms = benchmark.duration_ms, "cpu benchmark finished");
    Ok(benchmark)
}

fn scratch_file(dir: &Path, kind: &str) -> std::path::PathBuf {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    dir.join(format!("nestos-{kind}-{}-{nanos}.bin", std::process::id()))
}

async fn remove_scratch(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove benchmark file");
        }
    }
}

fn throughput_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d+(?:[.,]\d+)?)\s*([kKMGT]?B)/s").expect("valid throughput regex")
    })
}

/// 提取最后一个 `<number> <unit>/s` 并换算为 GB/s；找不到时返回 0。
pub(crate) fn parse_throughput(text: &str) -> f64 {
    let Some(caps) = throughput_regex().captures_iter(text).last() else {
        return 0.0;
    };
    let value: f64 = caps[1].replace(',', ".").parse().unwrap_or(0.0);
    // dd 使用十进制单位
    let scale = match &caps[2] {
        "B" => 1e-9,
        "kB" | "KB" => 1e-6,
        "MB" => 1e-3,
        "GB" => 1.0,
        "TB" => 1e3,
        _ => 0.0,
    };
    value * scale
}

/// fio JSON 报告中的 `jobs[0].read.iops`；无法解析时返回 0。
pub(crate) fn parse_fio_iops(text: &str) -> f64 {
    // fio 可能在 JSON 前打印告警
    let Some(start) = text.find('{') else {
        return 0.0;
    };
    serde_json::from_str::<serde_json::Value>(&text[start..])
        .ok()
        .and_then(|v| v.pointer("/jobs/0/read/iops").and_then(|n| n.as_f64()))
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::manager::tests::manager_with;
    use crate::testing::ScriptedRunner;

    fn dd_output(speed: &str) -> CommandOutput {
        CommandOutput {
            stdout: String::new(),
            stderr: format!(
                "1000+0 records in\n1000+0 records out\n1048576000 bytes (1.0 GB, 1000 MiB) copied, 0.5 s, {speed}\n"
            ),
            exit_code: Some(0),
        }
    }

    #[test]
    fn throughput_units_are_normalised_to_gb() {
        assert_eq!(parse_throughput("copied, 0.3 s, 3.5 GB/s"), 3.5);
        assert!((parse_throughput("copied, 2 s, 512 MB/s") - 0.512).abs() < 1e-9);
        assert!((parse_throughput("copied, 2 s, 1,5 GB/s") - 1.5).abs() < 1e-9);
        assert!((parse_throughput("copied, 9 s, 900 kB/s") - 0.0009).abs() < 1e-9);
    }

    #[test]
    fn throughput_without_match_is_zero() {
        assert_eq!(parse_throughput(""), 0.0);
        assert_eq!(parse_throughput("dd: failed to open"), 0.0);
        // "1.0 GB," 不是速率
        assert_eq!(parse_throughput("1048576000 bytes (1.0 GB, 1000 MiB) copied"), 0.0);
    }

    #[test]
    fn fio_iops_extraction() {
        let json = r#"fio: warning
{"jobs":[{"jobname":"nestos-randread","read":{"iops":12345.6}}]}"#;
        assert_eq!(parse_fio_iops(json), 12345.6);
        assert_eq!(parse_fio_iops("not json"), 0.0);
        assert_eq!(parse_fio_iops(r#"{"jobs":[]}"#), 0.0);
    }

    #[tokio::test]
    async fn performance_test_merges_measurements() {
        let runner = ScriptedRunner::new()
            .respond("dd", dd_output("1.2 GB/s"))
            .respond_when("dd", "of=/dev/null", dd_output("2.4 GB/s"))
            .respond(
                "fio",
                CommandOutput::ok(r#"{"jobs":[{"read":{"iops":5000.0}}]}"#),
            );
        let manager = manager_with(runner);
        let result = manager.run_performance_test().await.unwrap();
        assert_eq!(result.cpu.iterations, CPU_ITERATIONS);
        assert!(result.cpu.duration_ms > 0.0);
        assert_eq!(result.memory.write_speed, 1.2);
        assert_eq!(result.memory.read_speed, 2.4);
        assert_eq!(result.disk.write_speed, 1.2);
        assert_eq!(result.disk.read_speed, 2.4);
        assert_eq!(result.disk.iops, 5000.0);
        assert_eq!(result.load.avg_load.len(), 3);
    }

    #[tokio::test]
    async fn benchmark_commands_use_fixed_parameters() {
        let runner = Arc::new(ScriptedRunner::new());
        let manager = HostManager::new(
            runner.clone(),
            Arc::new(crate::testing::StaticEngine::default()),
            ManagerConfig::default(),
        );
        manager.run_performance_test().await.unwrap();
        let calls = runner.calls();
        let dd_writes: Vec<_> = calls
            .iter()
            .filter(|c| c[0] == "dd" && c.iter().any(|a| a == "if=/dev/zero"))
            .collect();
        assert_eq!(dd_writes.len(), 2);
        for call in dd_writes {
            assert!(call.iter().any(|a| a == "bs=1M"));
            assert!(call.iter().any(|a| a == "count=1000"));
        }
        let fio = calls.iter().find(|c| c[0] == "fio").unwrap();
        assert!(fio.iter().any(|a| a == "--iodepth=32"));
        assert!(fio.iter().any(|a| a == "--runtime=10"));
        assert!(fio.iter().any(|a| a == "--output-format=json"));
        // 输出中没有速率时降级为 0
        let result = manager.run_performance_test().await.unwrap();
        assert_eq!(result.memory, MemoryBenchmark::default());
    }

    #[tokio::test]
    async fn failing_dd_fails_the_test() {
        let runner = ScriptedRunner::new().fail("dd", 1, "dd: No space left on device");
        let err = manager_with(runner).run_performance_test().await.unwrap_err();
        assert!(matches!(err, NestError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn scratch_files_are_removed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = scratch_file(dir.path(), "disk");
        tokio::fs::write(&path, b"data").await.unwrap();
        remove_scratch(&path).await;
        assert!(!path.exists());
        // 不存在的文件静默忽略
        remove_scratch(&path).await;
    }
}
