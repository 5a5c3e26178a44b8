use anyhow::{Context, Result};
use config::{builder::DefaultState, Config, ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    logging::LogConfig,
    worker::{default_pool_size, CoordinatorConfig, SyncConfig, WorkerConfig},
};
use crate::{ConfigResult, ConfigValidator};

const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/worker.toml",
    "worker.toml",
    "/etc/taskfarm/worker.toml",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    pub worker: WorkerConfig,
    pub coordinator: CoordinatorConfig,
    pub sync: SyncConfig,
    pub logging: LogConfig,
}

impl AppConfig {
    /// 加载配置：内置默认值 → 配置文件 → `TASKFARM_` 环境变量
    ///
    /// 环境变量用 `__` 分隔层级，例如 `TASKFARM_WORKER__POOL_SIZE=8`。
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Self::with_defaults(Config::builder())?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("TASKFARM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    fn with_defaults(
        builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>> {
        let worker = WorkerConfig::default();
        let coordinator = CoordinatorConfig::default();
        let sync = SyncConfig::default();

        Ok(builder
            .set_default("worker.listening_port", i64::from(worker.listening_port))?
            .set_default("worker.pool_size", default_pool_size() as i64)?
            .set_default(
                "worker.stats_interval_seconds",
                worker.stats_interval_seconds as i64,
            )?
            .set_default(
                "worker.shutdown_grace_seconds",
                worker.shutdown_grace_seconds as i64,
            )?
            .set_default("worker.max_frame_bytes", worker.max_frame_bytes as i64)?
            .set_default("worker.read_timeout_ms", worker.read_timeout_ms as i64)?
            .set_default("coordinator.host", coordinator.host)?
            .set_default("coordinator.port", i64::from(coordinator.port))?
            .set_default(
                "coordinator.connect_timeout_ms",
                coordinator.connect_timeout_ms as i64,
            )?
            .set_default("sync.reply_timeout_ms", sync.reply_timeout_ms as i64)?
            .set_default("sync.max_attempts", i64::from(sync.max_attempts))?
            .set_default("sync.retry_interval_ms", sync.retry_interval_ms as i64)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.worker.validate()?;
        self.coordinator.validate()?;
        self.sync.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}
