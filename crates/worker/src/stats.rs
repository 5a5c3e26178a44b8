use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use taskfarm_domain::{CompletedTask, PerformanceSnapshot};

use crate::pool::TaskPool;

/// 从已消费的完成记录累计节点性能数据
#[derive(Debug)]
pub struct StatsCollector {
    hostname: String,
    started_at: Instant,
    completed: AtomicU64,
    failed: AtomicU64,
    total_run_micros: AtomicU64,
}

impl StatsCollector {
    /// 主机名取自系统，获取失败时为 "unknown"
    pub fn new() -> Self {
        let hostname = hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".to_string());
        Self::with_hostname(hostname)
    }

    pub fn with_hostname<S: Into<String>>(hostname: S) -> Self {
        Self {
            hostname: hostname.into(),
            started_at: Instant::now(),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_run_micros: AtomicU64::new(0),
        }
    }

    /// 累计一条已消费的完成记录
    pub fn record(&self, completed: &CompletedTask) {
        if completed.outcome.is_success() {
            self.completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        let run_micros = u64::try_from(completed.usage.run_time.as_micros()).unwrap_or(u64::MAX);
        let _ = self
            .total_run_micros
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |total| {
                Some(total.saturating_add(run_micros))
            });
    }

    /// 生成当前性能快照，在途任务数取自执行池
    pub fn snapshot(&self, pool: &TaskPool) -> PerformanceSnapshot {
        let completed = self.completed.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let finished = completed + failed;
        let average_run_ms = if finished == 0 {
            0.0
        } else {
            self.total_run_micros.load(Ordering::Relaxed) as f64 / 1000.0 / finished as f64
        };

        PerformanceSnapshot {
            hostname: self.hostname.clone(),
            active_tasks: pool.active_tasks(),
            pool_size: pool.pool_size(),
            completed_tasks: completed,
            failed_tasks: failed,
            average_run_ms,
            uptime_seconds: self.started_at.elapsed().as_secs(),
            taken_at: Utc::now(),
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}
