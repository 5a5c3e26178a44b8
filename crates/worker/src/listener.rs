use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use taskfarm_domain::wire;
use taskfarm_domain::Message;
use taskfarm_errors::{WorkerError, WorkerResult};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::executors::ExecutorRegistry;
use crate::pool::TaskPool;

/// 入站任务监听
///
/// 每条连接只携带一条 TASK 消息。池满时提交会挂起，协调器的连接也随之等待。
/// 读取消息有期限，超时的连接直接丢弃。
pub struct TaskListener {
    listener: TcpListener,
    registry: Arc<ExecutorRegistry>,
    pool: TaskPool,
    max_frame_bytes: usize,
    read_timeout: Duration,
}

impl TaskListener {
    /// 绑定监听地址，端口为0时由系统分配
    pub async fn bind(
        addr: SocketAddr,
        registry: Arc<ExecutorRegistry>,
        pool: TaskPool,
        max_frame_bytes: usize,
        read_timeout: Duration,
    ) -> WorkerResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            registry,
            pool,
            max_frame_bytes,
            read_timeout,
        })
    }

    /// 实际绑定的地址
    pub fn local_addr(&self) -> WorkerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// 接受连接直到收到停止信号
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> WorkerResult<()> {
        info!("Accepting tasks on {}", self.local_addr()?);
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let registry = Arc::clone(&self.registry);
                            let pool = self.pool.clone();
                            let max_frame_bytes = self.max_frame_bytes;
                            let read_timeout = self.read_timeout;
                            tokio::spawn(async move {
                                let handled = Self::handle_connection(
                                    stream,
                                    &registry,
                                    &pool,
                                    max_frame_bytes,
                                    read_timeout,
                                )
                                .await;
                                if let Err(e) = handled {
                                    warn!("Dropping connection from {}: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Task listener shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    async fn handle_connection(
        mut stream: TcpStream,
        registry: &ExecutorRegistry,
        pool: &TaskPool,
        max_frame_bytes: usize,
        read_timeout: Duration,
    ) -> WorkerResult<()> {
        let message =
            tokio::time::timeout(read_timeout, wire::read_message(&mut stream, max_frame_bytes))
                .await
                .map_err(|_| {
                    WorkerError::transport(format!(
                        "no complete message within {}ms",
                        read_timeout.as_millis()
                    ))
                })??;
        match message {
            Message::Task(message) => {
                let spec = message.spec;
                info!("Received task {} of type '{}'", spec.id, spec.task_type);
                pool.submit(registry.resolve(spec)).await
            }
            other => {
                debug!("Ignoring unexpected {} on task listener", other.kind());
                Ok(())
            }
        }
    }
}
