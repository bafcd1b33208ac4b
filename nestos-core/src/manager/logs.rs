//! 系统日志：journalctl 优先，其次日志文件末尾，最后返回固定提示。

use super::*;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, instrument};

/// 所有来源都不可用时返回的文本
pub const NO_LOGS_SENTINEL: &str = "No logs available";

const CHUNK_SIZE: usize = 8 * 1024;

impl HostManager {
    /// 最近 `lines` 行系统日志。来源按顺序尝试，不合并。
    #[instrument(skip(self))]
    pub async fn system_logs(&self, lines: usize) -> Result<String> {
        let count = lines.to_string();
        match self
            .runner
            .run("journalctl", &["-n", count.as_str(), "--no-pager"])
            .await
        {
            Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
                return Ok(output.stdout);
            }
            Ok(output) => debug!(exit_code = ?output.exit_code, "journalctl unavailable"),
            Err(e) => debug!(error = %e, "journalctl unavailable"),
        }

        let path = self.config.syslog_path.clone();
        let tail = tokio::task::spawn_blocking(move || tail_file(&path, lines)).await?;
        match tail {
            Ok(tail) if tail.iter().any(|l| !l.trim().is_empty()) => Ok(tail.join("\n")),
            Ok(_) => Ok(NO_LOGS_SENTINEL.to_string()),
            Err(e) => {
                debug!(error = %e, "log file unavailable");
                Ok(NO_LOGS_SENTINEL.to_string())
            }
        }
    }
}

/// 从文件末尾按块向前读取，返回最后 `lines` 行（不含换行符）。
fn tail_file(path: &Path, lines: usize) -> std::io::Result<Vec<String>> {
    if lines == 0 {
        return Ok(vec![]);
    }
    let mut file = File::open(path)?;
    let mut pos = file.metadata()?.len();
    let mut data: Vec<u8> = Vec::new();
    let mut newline_count = 0usize;
    // 文件末尾的空行不计入行数
    let mut seen_content = false;

    while pos > 0 {
        let read_size = CHUNK_SIZE.min(pos as usize);
        pos -= read_size as u64;
        file.seek(SeekFrom::Start(pos))?;
        let mut buf = vec![0u8; read_size];
        file.read_exact(&mut buf)?;

        let boundary = buf.iter().enumerate().rev().find_map(|(idx, &b)| {
            if !seen_content {
                seen_content = !b.is_ascii_whitespace();
                return None;
            }
            if b != b'\n' {
                return None;
            }
            newline_count += 1;
            (newline_count >= lines).then_some(idx + 1)
        });

        match boundary {
            Some(start) => {
                buf.drain(..start);
                buf.extend_from_slice(&data);
                data = buf;
                break;
            }
            None => {
                buf.extend_from_slice(&data);
                data = buf;
            }
        }
    }

    let text = String::from_utf8_lossy(&data);
    let mut result: Vec<String> = text.lines().map(str::to_string).collect();
    while result.last().is_some_and(|l| l.trim().is_empty()) {
        result.pop();
    }
    if result.len() > lines {
        result.drain(..result.len() - lines);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::testing::{ScriptedRunner, StaticEngine};
    use tempfile::TempDir;

    fn manager(runner: ScriptedRunner, syslog: &Path) -> HostManager {
        HostManager::new(
            Arc::new(runner),
            Arc::new(StaticEngine::default()),
            ManagerConfig {
                syslog_path: syslog.to_path_buf(),
                ..ManagerConfig::default()
            },
        )
    }

    fn write_lines(path: &Path, count: usize) {
        let text: String = (1..=count).map(|i| format!("line {i}\n")).collect();
        std::fs::write(path, text).unwrap();
    }

    #[tokio::test]
    async fn journal_output_wins() {
        let dir = TempDir::new().unwrap();
        let syslog = dir.path().join("syslog");
        write_lines(&syslog, 5);
        let runner = ScriptedRunner::new().respond("journalctl", CommandOutput::ok("journal line\n"));
        let logs = manager(runner, &syslog).system_logs(10).await.unwrap();
        assert_eq!(logs, "journal line\n");
    }

    #[tokio::test]
    async fn falls_back_to_file_when_journal_fails() {
        let dir = TempDir::new().unwrap();
        let syslog = dir.path().join("syslog");
        write_lines(&syslog, 20);
        let runner = ScriptedRunner::new().fail("journalctl", 1, "No journal files were found.");
        let logs = manager(runner, &syslog).system_logs(3).await.unwrap();
        assert_eq!(logs, "line 18\nline 19\nline 20");
    }

    #[tokio::test]
    async fn empty_journal_output_also_falls_back() {
        let dir = TempDir::new().unwrap();
        let syslog = dir.path().join("syslog");
        write_lines(&syslog, 2);
        let runner = ScriptedRunner::new().respond("journalctl", CommandOutput::ok("  \n"));
        let logs = manager(runner, &syslog).system_logs(100).await.unwrap();
        assert_eq!(logs, "line 1\nline 2");
    }

    #[tokio::test]
    async fn sentinel_when_nothing_available() {
        let dir = TempDir::new().unwrap();
        let runner = ScriptedRunner::new().fail("journalctl", 1, "");
        let missing = manager(runner, &dir.path().join("missing"))
            .system_logs(10)
            .await
            .unwrap();
        assert_eq!(missing, NO_LOGS_SENTINEL);

        let empty = dir.path().join("empty");
        std::fs::write(&empty, "").unwrap();
        let runner = ScriptedRunner::new().fail("journalctl", 1, "");
        let logs = manager(runner, &empty).system_logs(10).await.unwrap();
        assert_eq!(logs, NO_LOGS_SENTINEL);
    }

    #[tokio::test]
    async fn journal_receives_line_count() {
        let runner = Arc::new(ScriptedRunner::new().respond("journalctl", CommandOutput::ok("x\n")));
        let manager = HostManager::new(
            runner.clone(),
            Arc::new(StaticEngine::default()),
            ManagerConfig::default(),
        );
        manager.system_logs(42).await.unwrap();
        assert_eq!(runner.calls()[0], vec!["journalctl", "-n", "42", "--no-pager"]);
    }

    #[test]
    fn tail_spans_multiple_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.log");
        // 每行约 20 字节，总大小远超单个块
        write_lines(&path, 5000);
        let tail = tail_file(&path, 1000).unwrap();
        assert_eq!(tail.len(), 1000);
        assert_eq!(tail.first().unwrap(), "line 4001");
        assert_eq!(tail.last().unwrap(), "line 5000");
    }

    #[test]
    fn tail_without_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.log");
        std::fs::write(&path, "a\nb\nc").unwrap();
        assert_eq!(tail_file(&path, 2).unwrap(), vec!["b", "c"]);
        assert_eq!(tail_file(&path, 10).unwrap(), vec!["a", "b", "c"]);
        assert!(tail_file(&path, 0).unwrap().is_empty());
    }

    #[test]
    fn tail_ignores_trailing_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.log");
        std::fs::write(&path, "a\nb\n\n").unwrap();
        assert_eq!(tail_file(&path, 1).unwrap(), vec!["b"]);
        assert_eq!(tail_file(&path, 2).unwrap(), vec!["a", "b"]);

        std::fs::write(&path, "a\n\nb\n \n\n\n").unwrap();
        assert_eq!(tail_file(&path, 2).unwrap(), vec!["", "b"]);
    }

    #[test]
    fn trailing_blank_lines_span_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("padded.log");
        let mut text = String::from("first\nlast\n");
        text.push_str(&"\n".repeat(CHUNK_SIZE * 2));
        std::fs::write(&path, text).unwrap();
        assert_eq!(tail_file(&path, 1).unwrap(), vec!["last"]);
    }

    #[tokio::test]
    async fn file_with_trailing_blank_lines_is_not_empty() {
        let dir = TempDir::new().unwrap();
        let syslog = dir.path().join("syslog");
        std::fs::write(&syslog, "a\nb\n\n").unwrap();
        let runner = ScriptedRunner::new().fail("journalctl", 1, "");
        let logs = manager(runner, &syslog).system_logs(1).await.unwrap();
        assert_eq!(logs, "b");
    }
}
