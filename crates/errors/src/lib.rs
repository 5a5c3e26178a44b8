use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("网络传输错误: {0}")]
    Transport(String),
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("注册握手超时: {timeout_ms}ms 内未收到协调器应答")]
    HandshakeTimeout { timeout_ms: u64 },
    #[error("注册握手失败: {0}")]
    HandshakeRejected(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("消息帧过大: {len} 字节 (上限 {max} 字节)")]
    FrameTooLarge { len: usize, max: usize },
    #[error("任务执行错误: {0}")]
    TaskExecution(String),
    #[error("不支持的任务类型: {0}")]
    UnsupportedTaskType(String),
    #[error("Worker尚未在协调器注册")]
    NotRegistered,
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type WorkerResult<T> = Result<T, WorkerError>;

impl WorkerError {
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }
    pub fn task_execution<S: Into<String>>(msg: S) -> Self {
        Self::TaskExecution(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    /// 传输层故障：连接、读写、超时以及无法解析的消息都归入此类
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            WorkerError::Transport(_)
                | WorkerError::Io(_)
                | WorkerError::HandshakeTimeout { .. }
                | WorkerError::HandshakeRejected(_)
                | WorkerError::Serialization(_)
                | WorkerError::FrameTooLarge { .. }
        )
    }
    pub fn is_timeout(&self) -> bool {
        matches!(self, WorkerError::HandshakeTimeout { .. })
    }
    pub fn is_retryable(&self) -> bool {
        self.is_transport() || matches!(self, WorkerError::NotRegistered)
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WorkerError::Configuration(_) | WorkerError::Internal(_)
        )
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        WorkerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for WorkerError {
    fn from(err: anyhow::Error) -> Self {
        WorkerError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests;
