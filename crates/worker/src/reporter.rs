use std::sync::Arc;

use taskfarm_domain::{CompletedTask, Message, PerformanceSnapshot, TaskId, TaskOutcome};
use taskfarm_errors::{WorkerError, WorkerResult};
use tracing::debug;

use crate::connection::Transport;
use crate::identity::WorkerState;

/// 结果与统计上报
///
/// 尽力而为：失败返回给调用方记录日志，不影响执行池和在途计数。
pub struct Reporter {
    state: Arc<WorkerState>,
    transport: Arc<dyn Transport>,
}

impl Reporter {
    pub fn new(state: Arc<WorkerState>, transport: Arc<dyn Transport>) -> Self {
        Self { state, transport }
    }

    /// 上报单个任务结果，未注册时不发起连接
    pub async fn report_result(
        &self,
        task_id: TaskId,
        outcome: TaskOutcome,
        cpu_share: f64,
    ) -> WorkerResult<()> {
        let worker_id = self
            .state
            .registered_id()
            .await
            .ok_or(WorkerError::NotRegistered)?;
        let message = Message::result(worker_id, task_id, outcome, cpu_share);
        self.transport
            .send(self.state.coordinator(), &message)
            .await?;
        debug!("Reported result of task {}", task_id);
        Ok(())
    }

    pub async fn report_completed(&self, completed: &CompletedTask) -> WorkerResult<()> {
        self.report_result(
            completed.task_id,
            completed.outcome.clone(),
            completed.usage.cpu_share,
        )
        .await
    }

    /// 上报节点性能快照
    pub async fn report_stats(&self, snapshot: PerformanceSnapshot) -> WorkerResult<()> {
        let worker_id = self
            .state
            .registered_id()
            .await
            .ok_or(WorkerError::NotRegistered)?;
        self.transport
            .send(self.state.coordinator(), &Message::stats(worker_id, snapshot))
            .await
    }
}
