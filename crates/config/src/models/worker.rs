use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult, ConfigValidator};

pub const DEFAULT_LISTENING_PORT: u16 = 7071;
pub const DEFAULT_COORDINATOR_PORT: u16 = 7070;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

/// 默认执行池大小取可用的并行度
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// 0 表示由系统分配临时端口
    pub listening_port: u16,
    /// 自荐ID，协调器总是可以覆盖
    #[serde(default)]
    pub proposed_id: Option<i64>,
    pub pool_size: usize,
    pub stats_interval_seconds: u64,
    pub shutdown_grace_seconds: u64,
    pub max_frame_bytes: usize,
    /// 入站连接读取一条完整消息的期限
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            listening_port: DEFAULT_LISTENING_PORT,
            proposed_id: None,
            pool_size: default_pool_size(),
            stats_interval_seconds: 30,
            shutdown_grace_seconds: 30,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

impl ConfigValidator for WorkerConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.pool_size == 0 {
            return Err(ConfigError::Validation("执行池大小必须大于0".to_string()));
        }
        if self.stats_interval_seconds == 0 {
            return Err(ConfigError::Validation("统计上报间隔必须大于0".to_string()));
        }
        if self.max_frame_bytes < 64 {
            return Err(ConfigError::Validation(format!(
                "消息帧上限过小: {} 字节",
                self.max_frame_bytes
            )));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::Validation("入站读取超时必须大于0".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoordinatorConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_COORDINATOR_PORT,
            connect_timeout_ms: 2000,
        }
    }
}

impl ConfigValidator for CoordinatorConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Validation("协调器地址不能为空".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Validation("协调器端口必须大于0".to_string()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Validation("连接超时时间必须大于0".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// 等待SYNC应答的期限
    pub reply_timeout_ms: u64,
    /// 0 表示无限重试
    pub max_attempts: u32,
    pub retry_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reply_timeout_ms: 3000,
            max_attempts: 0,
            retry_interval_ms: 2000,
        }
    }
}

impl ConfigValidator for SyncConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.reply_timeout_ms == 0 {
            return Err(ConfigError::Validation("注册应答超时必须大于0".to_string()));
        }
        // 为0时连接被拒会变成忙等重试
        if self.retry_interval_ms == 0 {
            return Err(ConfigError::Validation("注册重试间隔必须大于0".to_string()));
        }
        Ok(())
    }
}
