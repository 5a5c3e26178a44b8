use taskfarm_domain::{CoordinatorEndpoint, WorkerId, WorkerIdentity};
use tokio::sync::RwLock;
use tracing::info;

/// Worker节点共享状态
///
/// 身份记录只在注册握手成功时写入，其余组件(执行池、上报、统计)并发读取。
#[derive(Debug)]
pub struct WorkerState {
    identity: RwLock<WorkerIdentity>,
    listening_port: u16,
    coordinator: CoordinatorEndpoint,
}

impl WorkerState {
    pub fn new(
        listening_port: u16,
        proposed_id: Option<WorkerId>,
        coordinator: CoordinatorEndpoint,
    ) -> Self {
        Self {
            identity: RwLock::new(WorkerIdentity::new(listening_port, proposed_id)),
            listening_port,
            coordinator,
        }
    }

    pub async fn snapshot(&self) -> WorkerIdentity {
        self.identity.read().await.clone()
    }

    /// 当前ID(可能只是自荐ID)
    pub async fn current_id(&self) -> Option<WorkerId> {
        self.identity.read().await.id()
    }

    /// 仅在注册成功后返回ID
    pub async fn registered_id(&self) -> Option<WorkerId> {
        self.identity.read().await.registered_id()
    }

    pub async fn is_registered(&self) -> bool {
        self.identity.read().await.is_registered()
    }

    /// SYNC 请求中上报的任务端口
    pub fn listening_port(&self) -> u16 {
        self.listening_port
    }

    /// 协调器地址，启动后不变
    pub fn coordinator(&self) -> &CoordinatorEndpoint {
        &self.coordinator
    }

    pub(crate) async fn assign(&self, assigned: WorkerId) {
        let mut identity = self.identity.write().await;
        if identity.id() != Some(assigned) {
            info!(
                "Coordinator assigned id {} (proposed {:?})",
                assigned,
                identity.id()
            );
        }
        identity.assign(assigned);
    }
}
