use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use taskfarm_config::{AppConfig, ConfigValidator};
use taskfarm_domain::{CoordinatorEndpoint, WorkerId};
use taskfarm_errors::{WorkerError, WorkerResult};
use tokio::sync::{broadcast, Mutex};
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::connection::{TcpTransport, Transport};
use crate::executors::ExecutorRegistry;
use crate::identity::WorkerState;
use crate::listener::TaskListener;
use crate::pool::{CompletionChannel, TaskPool};
use crate::reporter::Reporter;
use crate::stats::StatsCollector;
use crate::sync::SyncProtocol;

const RETRY_JITTER_PERCENT: u64 = 20;
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// 重试间隔加上最多20%的随机抖动
fn retry_delay(base_ms: u64) -> Duration {
    let jitter_max = base_ms.saturating_mul(RETRY_JITTER_PERCENT) / 100;
    let jitter = if jitter_max == 0 {
        0
    } else {
        rand::rng().random_range(0..=jitter_max)
    };
    Duration::from_millis(base_ms.saturating_add(jitter))
}

/// Worker节点：注册、接收任务、执行并上报
pub struct WorkerNode {
    config: AppConfig,
    state: Arc<WorkerState>,
    sync: SyncProtocol,
    pool: TaskPool,
    completions: Mutex<Option<CompletionChannel>>,
    listener: Mutex<Option<TaskListener>>,
    reporter: Arc<Reporter>,
    stats: Arc<StatsCollector>,
}

impl WorkerNode {
    /// 绑定任务监听端口并组装各组件
    ///
    /// 监听端口为0时由系统分配，注册时上报实际端口。
    pub async fn bind(config: AppConfig, registry: ExecutorRegistry) -> WorkerResult<Self> {
        let transport = TcpTransport::new(Duration::from_millis(
            config.coordinator.connect_timeout_ms,
        ))
        .with_max_frame_bytes(config.worker.max_frame_bytes);
        Self::bind_with_transport(config, registry, transport.clone(), Arc::new(transport)).await
    }

    /// 同 `bind`，上报使用指定的传输实现
    pub async fn bind_with_transport(
        config: AppConfig,
        registry: ExecutorRegistry,
        sync_transport: TcpTransport,
        report_transport: Arc<dyn Transport>,
    ) -> WorkerResult<Self> {
        config
            .validate()
            .map_err(|e| WorkerError::config_error(e.to_string()))?;
        let (pool, completions) = TaskPool::new(config.worker.pool_size)?;

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.worker.listening_port));
        let listener = TaskListener::bind(
            addr,
            Arc::new(registry),
            pool.clone(),
            config.worker.max_frame_bytes,
            Duration::from_millis(config.worker.read_timeout_ms),
        )
        .await?;
        let listening_port = listener.local_addr()?.port();

        let state = Arc::new(WorkerState::new(
            listening_port,
            config.worker.proposed_id.map(WorkerId),
            CoordinatorEndpoint::new(config.coordinator.host.clone(), config.coordinator.port),
        ));
        let sync = SyncProtocol::new(
            Arc::clone(&state),
            sync_transport,
            Duration::from_millis(config.sync.reply_timeout_ms),
        );
        let reporter = Arc::new(Reporter::new(Arc::clone(&state), report_transport));

        Ok(Self {
            config,
            state,
            sync,
            pool,
            completions: Mutex::new(Some(completions)),
            listener: Mutex::new(Some(listener)),
            reporter,
            stats: Arc::new(StatsCollector::new()),
        })
    }

    /// 共享的身份状态
    pub fn state(&self) -> Arc<WorkerState> {
        Arc::clone(&self.state)
    }

    pub fn pool(&self) -> &TaskPool {
        &self.pool
    }

    /// 已消费完成记录的累计统计
    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    /// 实际监听的任务端口
    pub fn listening_port(&self) -> u16 {
        self.state.listening_port()
    }

    /// 反复尝试注册，直到成功、次数耗尽或收到关闭信号
    ///
    /// 收到关闭信号时返回 `Ok(None)`。
    pub async fn register(
        &self,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> WorkerResult<Option<WorkerId>> {
        let max_attempts = self.config.sync.max_attempts;
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            let result = tokio::select! {
                result = self.sync.sync() => result,
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested during registration");
                    return Ok(None);
                }
            };

            let err = match result {
                Ok(id) => return Ok(Some(id)),
                Err(e) => e,
            };
            if max_attempts != 0 && attempt >= max_attempts {
                error!("Registration failed after {} attempts: {}", attempt, err);
                return Err(err);
            }

            let delay = retry_delay(self.config.sync.retry_interval_ms);
            warn!(
                "Registration attempt {} failed ({}), retrying in {}ms",
                attempt,
                err,
                delay.as_millis()
            );
            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested during registration");
                    return Ok(None);
                }
            }
        }
    }

    /// 运行节点直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> WorkerResult<()> {
        let Some(worker_id) = self.register(&mut shutdown_rx).await? else {
            return Ok(());
        };

        let listener = self
            .listener
            .lock()
            .await
            .take()
            .ok_or_else(|| WorkerError::Internal("worker node already started".to_string()))?;
        let completions = self
            .completions
            .lock()
            .await
            .take()
            .ok_or_else(|| WorkerError::Internal("worker node already started".to_string()))?;

        let (listener_stop_tx, listener_stop_rx) = broadcast::channel(1);
        let (stop_tx, _) = broadcast::channel(1);
        let listener_handle = tokio::spawn(listener.run(listener_stop_rx));
        let dispatch_handle = tokio::spawn(Self::dispatch_completions(
            completions,
            self.pool.clone(),
            Arc::clone(&self.reporter),
            Arc::clone(&self.stats),
            stop_tx.subscribe(),
        ));
        let stats_handle = tokio::spawn(Self::report_stats_periodically(
            Duration::from_secs(self.config.worker.stats_interval_seconds),
            self.pool.clone(),
            Arc::clone(&self.reporter),
            Arc::clone(&self.stats),
            stop_tx.subscribe(),
        ));

        info!(
            "Worker {} running with {} execution slots",
            worker_id,
            self.pool.pool_size()
        );
        let _ = shutdown_rx.recv().await;

        info!("Worker {} stopping", worker_id);
        self.pool.close();
        let _ = listener_stop_tx.send(());
        match listener_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Task listener failed: {}", e),
            Err(e) => error!("Task listener ended abnormally: {}", e),
        }
        self.drain(Duration::from_secs(self.config.worker.shutdown_grace_seconds))
            .await;

        let _ = stop_tx.send(());
        for handle in [dispatch_handle, stats_handle] {
            if let Err(e) = handle.await {
                error!("Background loop ended abnormally: {}", e);
            }
        }
        info!("Worker {} stopped", worker_id);
        Ok(())
    }

    /// 等待在途任务全部完成并被上报
    async fn drain(&self, grace: Duration) {
        let deadline = Instant::now() + grace;
        while self.pool.active_tasks() > 0 {
            if Instant::now() >= deadline {
                warn!(
                    "Shutdown grace period elapsed with {} tasks still active",
                    self.pool.active_tasks()
                );
                return;
            }
            sleep(DRAIN_POLL_INTERVAL).await;
        }
        debug!("All active tasks drained");
    }

    async fn dispatch_completions(
        mut completions: CompletionChannel,
        pool: TaskPool,
        reporter: Arc<Reporter>,
        stats: Arc<StatsCollector>,
        mut stop_rx: broadcast::Receiver<()>,
    ) {
        loop {
            let completed = tokio::select! {
                completed = completions.recv() => match completed {
                    Some(completed) => completed,
                    None => break,
                },
                _ = stop_rx.recv() => break,
            };

            let remaining = pool.on_completion_observed();
            stats.record(&completed);
            debug!(
                "Task {} finished (success={}, {} still active)",
                completed.task_id,
                completed.outcome.is_success(),
                remaining
            );
            if let Err(e) = reporter.report_completed(&completed).await {
                error!("Sending result of task {} failed: {}", completed.task_id, e);
            }
        }
        debug!("Completion dispatch loop stopped");
    }

    async fn report_stats_periodically(
        period: Duration,
        pool: TaskPool,
        reporter: Arc<Reporter>,
        stats: Arc<StatsCollector>,
        mut stop_rx: broadcast::Receiver<()>,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // 第一次tick立即完成，跳过
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = reporter.report_stats(stats.snapshot(&pool)).await {
                        warn!("Sending stats failed: {}", e);
                    }
                }
                _ = stop_rx.recv() => break,
            }
        }
        debug!("Stats loop stopped");
    }
}
