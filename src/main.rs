use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, Command};
use taskfarm_config::{AppConfig, OutputFormat};
use taskfarm_worker::{ExecutorRegistry, WorkerNode};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod shutdown;

use app::CliOverrides;
use shutdown::{wait_for_os_signal, ShutdownSignal};

/// 优雅关闭等待之外额外留给后台任务收尾的时间
const SHUTDOWN_SLACK: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("taskfarm-worker")
        .version(env!("CARGO_PKG_VERSION"))
        .about("任务农场计算节点")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径 (默认搜索 config/worker.toml 等)"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"]),
        )
        .arg(
            Arg::new("listen-port")
                .short('p')
                .long("listen-port")
                .value_name("PORT")
                .help("接收任务的端口")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("coordinator")
                .long("coordinator")
                .value_name("HOST:PORT")
                .help("协调器地址"),
        )
        .arg(
            Arg::new("worker-id")
                .long("worker-id")
                .value_name("ID")
                .help("自荐的Worker ID，协调器可以覆盖")
                .value_parser(value_parser!(i64)),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");
    let overrides = CliOverrides {
        log_level: matches.get_one::<String>("log-level").cloned(),
        log_format: matches.get_one::<String>("log-format").cloned(),
        listen_port: matches.get_one::<u16>("listen-port").copied(),
        coordinator: matches.get_one::<String>("coordinator").cloned(),
        worker_id: matches.get_one::<i64>("worker-id").copied(),
    };

    // 加载配置
    let mut config = AppConfig::load(config_path.map(String::as_str))
        .with_context(|| format!("加载配置失败: {config_path:?}"))?;
    overrides.apply(&mut config)?;

    // 初始化日志系统
    init_logging(&config.logging.level.to_string(), config.logging.format)?;

    info!("启动任务农场计算节点");
    info!(
        "协调器: {}:{}, 执行槽位: {}",
        config.coordinator.host, config.coordinator.port, config.worker.pool_size
    );

    let grace = Duration::from_secs(config.worker.shutdown_grace_seconds) + SHUTDOWN_SLACK;
    let node = Arc::new(
        WorkerNode::bind(config, ExecutorRegistry::with_builtin())
            .await
            .context("初始化Worker节点失败")?,
    );
    info!("任务监听端口: {}", node.listening_port());

    let shutdown = ShutdownSignal::new();
    let mut node_handle = {
        let node = Arc::clone(&node);
        let shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move { node.run(shutdown_rx).await })
    };

    tokio::select! {
        _ = wait_for_os_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
            shutdown.trigger();

            match tokio::time::timeout(grace, &mut node_handle).await {
                Ok(Ok(Ok(()))) => info!("Worker节点已优雅关闭"),
                Ok(Ok(Err(e))) => error!("Worker节点关闭时发生错误: {e}"),
                Ok(Err(e)) => error!("Worker节点任务异常退出: {e}"),
                Err(_) => warn!("Worker节点关闭超时，强制退出"),
            }
        }
        result = &mut node_handle => {
            match result {
                Ok(Ok(())) => info!("Worker节点已退出"),
                Ok(Err(e)) => {
                    error!("Worker节点运行失败: {e}");
                    return Err(anyhow::anyhow!("Worker节点运行失败: {e}"));
                }
                Err(e) => return Err(anyhow::anyhow!("Worker节点任务异常退出: {e}")),
            }
        }
    }

    info!("任务农场计算节点已退出");
    Ok(())
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: OutputFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        OutputFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        OutputFormat::Pretty => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
    }

    Ok(())
}
