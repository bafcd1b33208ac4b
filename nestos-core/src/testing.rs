//! 测试用假实现：不调用真实系统命令，也不连接 Docker。

use crate::container::{
    ContainerDetails, ContainerSpec, ContainerState, ContainerSummary, EngineInfo, ImageSummary,
};
use crate::engine::{ContainerEngine, StatsSample};
use crate::error::{NestError, Result};
use crate::exec::{CommandOutput, CommandRunner};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// 按程序名（可选参数片段）返回预设输出，并记录每次调用。
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Vec<(String, Option<String>, CommandOutput)>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 对 `program` 的所有调用返回 `output`
    pub fn respond(mut self, program: &str, output: CommandOutput) -> Self {
        self.responses.push((program.to_string(), None, output));
        self
    }

    /// 参数中包含 `needle` 时返回 `output`，优先于 `respond`
    pub fn respond_when(mut self, program: &str, needle: &str, output: CommandOutput) -> Self {
        self.responses
            .push((program.to_string(), Some(needle.to_string()), output));
        self
    }

    pub fn fail(self, program: &str, code: i32, stderr: &str) -> Self {
        self.respond(program, CommandOutput::failed(code, stderr))
    }

    /// 已执行的命令（program + args）
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// 已执行的程序名
    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().filter_map(|c| c.into_iter().next()).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let mut call = vec![program.to_string()];
        call.extend(args.iter().map(|a| a.to_string()));
        let joined = args.join(" ");
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);

        let specific = self.responses.iter().find(|(p, needle, _)| {
            p == program && needle.as_deref().is_some_and(|n| joined.contains(n))
        });
        let generic = || {
            self.responses
                .iter()
                .find(|(p, needle, _)| p == program && needle.is_none())
        };
        Ok(specific
            .or_else(generic)
            .map(|(_, _, out)| out.clone())
            .unwrap_or_else(|| CommandOutput::ok("")))
    }
}

/// 内存中的容器引擎
#[derive(Debug, Default)]
pub struct StaticEngine {
    pub containers: Vec<ContainerSummary>,
    pub images: Vec<ImageSummary>,
    pub info: EngineInfo,
    pub stats: HashMap<String, StatsSample>,
    /// 设置后所有操作都返回该错误信息
    pub failure: Option<String>,
    /// 记录调用，如 "create:web"、"start:abc"
    pub events: Mutex<Vec<String>>,
}

impl StaticEngine {
    fn record(&self, event: String) -> Result<()> {
        if let Some(msg) = &self.failure {
            return Err(NestError::Other(msg.clone()));
        }
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        Ok(())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl ContainerEngine for StaticEngine {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        self.record(format!("list:{all}"))?;
        Ok(self
            .containers
            .iter()
            .filter(|c| all || c.state == "running")
            .cloned()
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        self.record(format!("inspect:{id}"))?;
        let summary = self
            .containers
            .iter()
            .find(|c| c.id == id || c.name == id)
            .ok_or_else(|| NestError::NotFound(format!("No such container: {id}")))?;
        Ok(ContainerDetails {
            id: summary.id.clone(),
            name: summary.name.clone(),
            image: summary.image.clone(),
            created: String::new(),
            state: ContainerState {
                status: summary.state.clone(),
                running: summary.state == "running",
                started_at: None,
                finished_at: None,
                exit_code: None,
            },
            restart_policy: "no".into(),
            env: vec![],
            mounts: vec![],
            ports: serde_json::Value::Null,
        })
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<(String, Vec<String>)> {
        let name = spec.name.clone().unwrap_or_else(|| "anonymous".into());
        self.record(format!("create:{name}"))?;
        Ok((format!("id-{name}"), vec![]))
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.record(format!("start:{id}"))
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        self.record(format!("stop:{id}"))
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.record(format!("remove:{id}"))
    }

    async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        self.record("images".into())?;
        Ok(self.images.clone())
    }

    async fn pull_image(&self, image: &str, tag: &str) -> Result<()> {
        self.record(format!("pull:{image}:{tag}"))
    }

    async fn remove_image(&self, id: &str) -> Result<()> {
        self.record(format!("rmi:{id}"))
    }

    async fn info(&self) -> Result<EngineInfo> {
        self.record("info".into())?;
        Ok(self.info.clone())
    }

    async fn stats_sample(&self, id: &str) -> Result<StatsSample> {
        self.record(format!("stats:{id}"))?;
        self.stats
            .get(id)
            .cloned()
            .ok_or_else(|| NestError::NotFound(format!("No such container: {id}")))
    }
}
