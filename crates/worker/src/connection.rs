use std::time::Duration;

use async_trait::async_trait;
use taskfarm_domain::wire::{self, DEFAULT_MAX_FRAME_BYTES};
use taskfarm_domain::{CoordinatorEndpoint, Message};
use taskfarm_errors::{WorkerError, WorkerResult};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

/// 一次性出站消息发送
///
/// 每次调用建立一条新连接，只写一条消息，不读取任何应答。
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, endpoint: &CoordinatorEndpoint, message: &Message) -> WorkerResult<()>;
}

#[derive(Debug, Clone)]
pub struct TcpTransport {
    connect_timeout: Duration,
    max_frame_bytes: usize,
}

impl TcpTransport {
    /// 使用默认消息帧上限创建
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    /// 在连接超时内建立到协调器的连接
    pub async fn connect(&self, endpoint: &CoordinatorEndpoint) -> WorkerResult<TcpStream> {
        let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => {
                // 单条小消息，禁用Nagle避免延迟
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            Ok(Err(e)) => Err(WorkerError::transport(format!(
                "failed to connect to coordinator {endpoint}: {e}"
            ))),
            Err(_) => Err(WorkerError::transport(format!(
                "connecting to coordinator {endpoint} timed out after {}ms",
                self.connect_timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn send(&self, endpoint: &CoordinatorEndpoint, message: &Message) -> WorkerResult<()> {
        let mut stream = self.connect(endpoint).await?;
        wire::write_message(&mut stream, message).await?;
        // 写端半关闭，连接在drop时完全释放
        stream.shutdown().await?;
        debug!("Sent {} to {}", message.kind(), endpoint);
        Ok(())
    }
}
