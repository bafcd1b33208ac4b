//! systemd 服务枚举

use super::*;
use crate::models::ServiceUnit;
use tracing::instrument;

impl HostManager {
    /// 枚举 systemd 服务单元（`systemctl list-units`）。
    #[instrument(skip(self))]
    pub async fn list_services(&self) -> Result<Vec<ServiceUnit>> {
        let output = self
            .runner
            .run_checked(
                "systemctl",
                &[
                    "list-units",
                    "--type=service",
                    "--all",
                    "--no-legend",
                    "--no-pager",
                    "--plain",
                ],
            )
            .await?;
        Ok(parse_units(&output.stdout))
    }
}

/// 每行格式：`UNIT LOAD ACTIVE SUB DESCRIPTION...`
fn parse_units(text: &str) -> Vec<ServiceUnit> {
    text.lines()
        .filter_map(|line| {
            // 失败的单元前面可能带有状态圆点
            let line = line.trim().trim_start_matches('●').trim_start();
            let mut parts = line.split_whitespace();
            let name = parts.next()?.to_string();
            let load = parts.next()?.to_string();
            let active = parts.next()?.to_string();
            let sub = parts.next()?.to_string();
            let description = parts.collect::<Vec<_>>().join(" ");
            Some(ServiceUnit {
                running: sub == "running",
                name,
                load,
                active,
                sub,
                description,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::manager::tests::manager_with;
    use crate::testing::ScriptedRunner;

    #[test]
    fn parses_unit_lines() {
        let text = "\
cron.service loaded active running Regular background program processing daemon
● nginx.service loaded failed failed A high performance web server
ssh.service  loaded inactive dead   OpenBSD Secure Shell server

short line
";
        let units = parse_units(text);
        assert_eq!(units.len(), 3);
        assert_eq!(units[0].name, "cron.service");
        assert!(units[0].running);
        assert_eq!(units[0].description, "Regular background program processing daemon");
        assert_eq!(units[1].name, "nginx.service");
        assert_eq!(units[1].active, "failed");
        assert!(!units[1].running);
        assert_eq!(units[2].sub, "dead");
    }

    #[tokio::test]
    async fn systemctl_failure_propagates() {
        let runner = ScriptedRunner::new().respond(
            "systemctl",
            CommandOutput::failed(1, "System has not been booted with systemd"),
        );
        let err = manager_with(runner).list_services().await.unwrap_err();
        assert!(err.to_string().contains("systemd"));
    }
}
