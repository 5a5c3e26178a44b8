use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 节点性能快照，周期性上报给协调器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub hostname: String,
    pub active_tasks: usize,
    pub pool_size: usize,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub average_run_ms: f64,
    pub uptime_seconds: u64,
    pub taken_at: DateTime<Utc>,
}
