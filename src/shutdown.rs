use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Worker进程的关闭信号
///
/// 节点、任务监听等组件在启动前订阅，信号只触发一次。
pub struct ShutdownSignal {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// 通知所有订阅者关闭，重复调用返回 false
    pub fn trigger(&self) -> bool {
        if self.triggered.swap(true, Ordering::AcqRel) {
            debug!("Shutdown already triggered");
            return false;
        }
        // 没有订阅者时发送失败，无需处理
        let receivers = self.tx.send(()).unwrap_or(0);
        info!("Shutdown signalled to {} subscribers", receivers);
        true
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// 等待 Ctrl+C 或 SIGTERM
pub async fn wait_for_os_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到Ctrl+C信号"),
        _ = terminate => info!("收到SIGTERM信号"),
    }
}
