//! 注册握手
//!
//! Worker 向协调器发送 SYNC 请求，在同一连接上等待携带分配ID的 SYNC 应答。
//! 应答必须在期限内到达，否则关闭连接放弃本次握手，由上层决定是否重试。
//!
//! ```text
//! Unsynced ──发送成功──> AwaitingReply ──收到应答──> Registered
//!     │                       │
//!     └──发送失败──> Aborted <──超时/读失败
//! ```

use std::sync::Arc;
use std::time::Duration;

use taskfarm_domain::wire;
use taskfarm_domain::{Message, WorkerId};
use taskfarm_errors::{WorkerError, WorkerResult};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::connection::TcpTransport;
use crate::identity::WorkerState;

/// 注册握手状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Unsynced,
    AwaitingReply,
    Registered,
    Aborted,
}

/// 注册握手协议，每次 `sync` 使用一条新连接
pub struct SyncProtocol {
    state: Arc<WorkerState>,
    transport: TcpTransport,
    reply_timeout: Duration,
    sync_state: RwLock<SyncState>,
}

impl SyncProtocol {
    pub fn new(state: Arc<WorkerState>, transport: TcpTransport, reply_timeout: Duration) -> Self {
        Self {
            state,
            transport,
            reply_timeout,
            sync_state: RwLock::new(SyncState::Unsynced),
        }
    }

    /// 最近一次握手所处的状态
    pub async fn sync_state(&self) -> SyncState {
        *self.sync_state.read().await
    }

    /// 等待应答的期限
    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// 执行一次注册握手，成功时返回协调器分配的ID
    ///
    /// 自荐ID取当前身份中的ID：首次为配置的自荐值，之后为上次分配的ID。
    pub async fn sync(&self) -> WorkerResult<WorkerId> {
        self.transition(SyncState::Unsynced).await;

        let proposed_id = self.state.current_id().await;
        let request = Message::sync_request(proposed_id, self.state.listening_port());
        let endpoint = self.state.coordinator();

        let mut stream = match self.send_request(&request).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Sending SYNC to {} failed: {}", endpoint, e);
                self.transition(SyncState::Aborted).await;
                return Err(e);
            }
        };
        debug!(
            "SYNC sent to {} (proposed id {:?}, port {})",
            endpoint,
            proposed_id,
            self.state.listening_port()
        );
        self.transition(SyncState::AwaitingReply).await;

        let max_frame_bytes = self.transport.max_frame_bytes();
        let reply = tokio::time::timeout(
            self.reply_timeout,
            Self::await_reply(&mut stream, max_frame_bytes),
        )
        .await;

        match reply {
            Ok(Ok(assigned)) => {
                self.state.assign(assigned).await;
                // 应答已读到，关闭失败不影响注册结果
                if let Err(e) = stream.shutdown().await {
                    debug!("Closing SYNC connection failed: {}", e);
                }
                drop(stream);
                self.transition(SyncState::Registered).await;
                info!("Registered with coordinator {} as worker {}", endpoint, assigned);
                Ok(assigned)
            }
            Ok(Err(e)) => {
                drop(stream);
                warn!("SYNC interrupted: {}", e);
                self.transition(SyncState::Aborted).await;
                Err(WorkerError::HandshakeRejected(e.to_string()))
            }
            Err(_) => {
                // 超时即拆除连接，挂起的读取随之取消
                drop(stream);
                let timeout_ms = u64::try_from(self.reply_timeout.as_millis()).unwrap_or(u64::MAX);
                warn!("No SYNC reply from {} within {}ms", endpoint, timeout_ms);
                self.transition(SyncState::Aborted).await;
                Err(WorkerError::HandshakeTimeout { timeout_ms })
            }
        }
    }

    async fn send_request(&self, request: &Message) -> WorkerResult<TcpStream> {
        let mut stream = self.transport.connect(self.state.coordinator()).await?;
        wire::write_message(&mut stream, request).await?;
        Ok(stream)
    }

    /// 读取直到收到 SYNC 应答，其他类型的消息忽略
    async fn await_reply(stream: &mut TcpStream, max_frame_bytes: usize) -> WorkerResult<WorkerId> {
        loop {
            match wire::read_message(stream, max_frame_bytes).await? {
                Message::SyncReply(reply) => return Ok(reply.assigned_id),
                other => debug!("Ignoring {} while awaiting SYNC reply", other.kind()),
            }
        }
    }

    async fn transition(&self, next: SyncState) {
        let mut current = self.sync_state.write().await;
        if *current != next {
            debug!("Sync state {:?} -> {:?}", *current, next);
        }
        *current = next;
    }
}
