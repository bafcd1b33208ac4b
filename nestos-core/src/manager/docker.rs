//! Docker 操作：校验参数后委托给 `ContainerEngine`。

use super::*;
use crate::container::{
    ContainerDetails, ContainerSpec, ContainerSummary, CreatedContainer, EngineInfo,
    ImageSummary, PullRequest,
};
use tracing::{info, instrument};

impl HostManager {
    #[instrument(skip(self))]
    pub async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        self.engine.list_containers(all).await
    }

    #[instrument(skip(self))]
    pub async fn inspect_container(&self, id: &str) -> Result<ContainerDetails> {
        self.validate_ref(id)?;
        self.engine.inspect_container(id).await
    }

    /// 创建容器；`spec.start` 为 true 时随后启动。
    ///
    /// 启动失败时容器保留在已创建状态，错误原样返回。
    #[instrument(skip(self, spec), fields(image = %spec.image))]
    pub async fn create_container(&self, spec: &ContainerSpec) -> Result<CreatedContainer> {
        spec.validate()?;
        let (id, warnings) = self.engine.create_container(spec).await?;
        if spec.start {
            self.engine.start_container(&id).await?;
        }
        info!(%id, started = spec.start, "container created");
        Ok(CreatedContainer {
            id,
            warnings,
            started: spec.start,
        })
    }

    #[instrument(skip(self))]
    pub async fn start_container(&self, id: &str) -> Result<()> {
        self.validate_ref(id)?;
        self.engine.start_container(id).await
    }

    #[instrument(skip(self))]
    pub async fn stop_container(&self, id: &str) -> Result<()> {
        self.validate_ref(id)?;
        self.engine.stop_container(id).await
    }

    /// 强制删除（运行中的容器也会被删除）
    #[instrument(skip(self))]
    pub async fn remove_container(&self, id: &str) -> Result<()> {
        self.validate_ref(id)?;
        self.engine.remove_container(id).await
    }

    #[instrument(skip(self))]
    pub async fn list_images(&self) -> Result<Vec<ImageSummary>> {
        self.engine.list_images().await
    }

    /// 拉取镜像，等待整个拉取流结束后返回 `image:tag`
    #[instrument(skip(self))]
    pub async fn pull_image(&self, request: &PullRequest) -> Result<String> {
        let (image, tag) = request.reference()?;
        self.engine.pull_image(&image, &tag).await?;
        info!(%image, %tag, "image pulled");
        Ok(format!("{image}:{tag}"))
    }

    #[instrument(skip(self))]
    pub async fn remove_image(&self, id: &str) -> Result<()> {
        self.validate_ref(id)?;
        self.engine.remove_image(id).await
    }

    #[instrument(skip(self))]
    pub async fn docker_info(&self) -> Result<EngineInfo> {
        self.engine.info().await
    }
}
