//! 外部命令执行：所有 shell 调用都经过 `CommandRunner`，测试时可替换为假实现。

use crate::error::{NestError, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// 一次命令执行的结果。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// 被信号终止时为 None
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(code),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// 执行外部程序的能力：execute(program, args) -> {stdout, stderr, exit_code}。
#[async_trait]
pub trait CommandRunner: Send + Sync + std::fmt::Debug {
    /// 执行命令并等待其退出；非零退出码不视为错误。
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    /// 执行命令，非零退出码转换为 `CommandFailed`。
    async fn run_checked(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(program, args).await?;
        if output.success() {
            Ok(output)
        } else {
            let stderr = if output.stderr.trim().is_empty() {
                output.stdout.trim().to_string()
            } else {
                output.stderr.trim().to_string()
            };
            Err(NestError::CommandFailed {
                program: program.to_string(),
                code: output.exit_code,
                stderr,
            })
        }
    }
}

/// 基于 tokio::process 的真实实现。
///
/// 调用方断开不会终止子进程：`output()` 的 future 被丢弃后子进程仍会继续运行。
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    #[instrument(skip(self))]
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!("spawning command");
        let output = tokio::process::Command::new(program)
            .args(args)
            .kill_on_drop(false)
            .output()
            .await
            .map_err(|source| NestError::Spawn {
                program: program.to_string(),
                source,
            })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code(),
        };
        if !result.success() {
            warn!(exit_code = ?result.exit_code, "command exited unsuccessfully");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let runner = SystemCommandRunner;
        let out = runner.run("sh", &["-c", "echo hello; exit 3"]).await.unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
    }

    #[tokio::test]
    async fn run_checked_reports_stderr() {
        let runner = SystemCommandRunner;
        let err = runner
            .run_checked("sh", &["-c", "echo boom >&2; exit 1"])
            .await
            .unwrap_err();
        match err {
            NestError::CommandFailed { program, code, stderr } => {
                assert_eq!(program, "sh");
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let runner = SystemCommandRunner;
        let err = runner
            .run("definitely-not-a-real-binary-nestos", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, NestError::Spawn { .. }));
    }
}
