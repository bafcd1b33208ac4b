use thiserror::Error;

/// Common result type for core operations.
pub type Result<T> = std::result::Result<T, NestError>;

#[derive(Debug, Error)]
pub enum NestError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("command `{program}` failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("docker error: {0}")]
    Docker(bollard::errors::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("other error: {0}")]
    Other(String),
}

impl From<bollard::errors::Error> for NestError {
    fn from(err: bollard::errors::Error) -> Self {
        // Docker 的 404 单独归类，其余错误原样透传
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => NestError::NotFound(message),
            other => NestError::Docker(other),
        }
    }
}

impl From<tokio::task::JoinError> for NestError {
    fn from(err: tokio::task::JoinError) -> Self {
        NestError::Other(format!("background task failed: {err}"))
    }
}
