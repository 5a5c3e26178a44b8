use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use taskfarm_domain::{CompletedTask, ResourceUsage, Task, TaskOutcome};
use taskfarm_errors::{WorkerError, WorkerResult};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, warn};

/// 在途任务计数：已接受但完成结果尚未被消费的任务数
#[derive(Debug, Default)]
pub struct ActiveTaskCount(AtomicUsize);

impl ActiveTaskCount {
    /// 当前在途任务数
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    fn increment(&self) -> usize {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// 计数不会降到0以下
    fn decrement(&self) -> usize {
        match self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(previous) => previous - 1,
            Err(_) => {
                warn!("Completion observed with no active tasks; count stays at 0");
                0
            }
        }
    }
}

/// 完成通道的消费端，按完成顺序交付结果
#[derive(Debug)]
pub struct CompletionChannel {
    receiver: mpsc::UnboundedReceiver<CompletedTask>,
}

impl CompletionChannel {
    pub async fn recv(&mut self) -> Option<CompletedTask> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<CompletedTask> {
        self.receiver.try_recv().ok()
    }
}

/// 固定大小的任务执行池
///
/// 任务在 tokio 阻塞线程上运行，同时运行的任务数由信号量限制；
/// 池满时 `submit` 挂起直到有空闲槽位。每个任务无论成功、失败还是 panic，
/// 都恰好产生一条完成记录。
#[derive(Debug, Clone)]
pub struct TaskPool {
    pool_size: usize,
    slots: Arc<Semaphore>,
    active: Arc<ActiveTaskCount>,
    completed_tx: mpsc::UnboundedSender<CompletedTask>,
}

impl TaskPool {
    pub fn new(pool_size: usize) -> WorkerResult<(Self, CompletionChannel)> {
        if pool_size == 0 {
            return Err(WorkerError::config_error("task pool size must be at least 1"));
        }
        let (completed_tx, receiver) = mpsc::unbounded_channel();
        let pool = Self {
            pool_size,
            slots: Arc::new(Semaphore::new(pool_size)),
            active: Arc::new(ActiveTaskCount::default()),
            completed_tx,
        };
        Ok((pool, CompletionChannel { receiver }))
    }

    /// 执行槽位数，创建后固定
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// 已提交但完成记录尚未被消费的任务数
    pub fn active_tasks(&self) -> usize {
        self.active.get()
    }

    /// 空闲执行槽位数
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    /// 提交任务；池满时等待空闲槽位
    pub async fn submit(&self, task: Box<dyn Task>) -> WorkerResult<()> {
        let submitted_at = Instant::now();
        let task_id = task.id();

        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::Internal(format!("task pool closed, task {task_id} rejected")))?;
        let in_flight = self.active.increment();
        debug!("Submitting task {} ({} in flight)", task_id, in_flight);

        let completed_tx = self.completed_tx.clone();
        let pool_size = self.pool_size;
        tokio::spawn(async move {
            let started_at = Instant::now();
            let joined = tokio::task::spawn_blocking(move || task.run()).await;
            let run_time = started_at.elapsed();
            drop(permit);

            let outcome = match joined {
                Ok(Ok(value)) => TaskOutcome::succeeded(value),
                Ok(Err(e)) => {
                    warn!("Task {} failed: {}", task_id, e);
                    TaskOutcome::failed(e.to_string())
                }
                Err(e) => {
                    error!("Task {} aborted: {}", task_id, e);
                    TaskOutcome::failed(format!("task aborted: {e}"))
                }
            };

            let completed = CompletedTask {
                task_id,
                outcome,
                usage: ResourceUsage::measure(run_time, submitted_at.elapsed(), pool_size),
            };
            if completed_tx.send(completed).is_err() {
                warn!("Completion channel closed, outcome of task {} dropped", task_id);
            }
        });

        Ok(())
    }

    /// 每消费一条完成记录调用一次，返回剩余在途任务数
    pub fn on_completion_observed(&self) -> usize {
        self.active.decrement()
    }

    /// 停止接受新任务，等待中的提交会失败；已在运行的任务不受影响
    pub fn close(&self) {
        self.slots.close();
    }
}
