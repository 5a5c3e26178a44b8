use std::time::Duration;

use serde::{Deserialize, Serialize};
use taskfarm_errors::WorkerResult;

use crate::TaskId;

/// 协调器下发的任务描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: TaskId,
    pub task_type: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// 可执行的工作单元
///
/// 提交后所有权转移给执行池，执行结束后结果进入完成通道。
/// `run` 在阻塞线程上调用，可以做CPU密集的计算。
pub trait Task: Send + 'static {
    fn id(&self) -> TaskId;
    fn run(self: Box<Self>) -> WorkerResult<serde_json::Value>;
}

/// 任务执行结果，失败同样会上报给协调器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded { value: serde_json::Value },
    Failed { error: String },
}

impl TaskOutcome {
    pub fn succeeded(value: serde_json::Value) -> Self {
        Self::Succeeded { value }
    }

    pub fn failed<S: Into<String>>(error: S) -> Self {
        Self::Failed {
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded { .. })
    }
}

/// 资源使用情况
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceUsage {
    /// 任务实际运行时长
    pub run_time: Duration,
    /// 任务在驻留期间占用的节点计算能力份额 (0.0 ~ 1.0)
    pub cpu_share: f64,
}

impl ResourceUsage {
    /// `residency` 是从提交到完成的总时长，包含等待执行槽位的时间
    pub fn measure(run_time: Duration, residency: Duration, pool_size: usize) -> Self {
        let residency = residency.max(run_time);
        let cpu_share = if residency.is_zero() || pool_size == 0 {
            0.0
        } else {
            run_time.as_secs_f64() / residency.as_secs_f64() / pool_size as f64
        };
        Self {
            run_time,
            cpu_share: cpu_share.clamp(0.0, 1.0),
        }
    }
}

/// 已完成(或失败)的任务句柄
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedTask {
    pub task_id: TaskId,
    pub outcome: TaskOutcome,
    pub usage: ResourceUsage,
}
