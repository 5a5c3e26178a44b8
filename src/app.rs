use anyhow::{Context, Result};
use taskfarm_config::{AppConfig, ConfigValidator, LogLevel, OutputFormat};

/// 命令行参数对配置的覆盖
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub listen_port: Option<u16>,
    pub coordinator: Option<String>,
    pub worker_id: Option<i64>,
}

impl CliOverrides {
    /// 命令行参数优先于配置文件和环境变量
    pub fn apply(&self, config: &mut AppConfig) -> Result<()> {
        if let Some(level) = &self.log_level {
            config.logging.level = level
                .parse::<LogLevel>()
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format
                .parse::<OutputFormat>()
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        if let Some(port) = self.listen_port {
            config.worker.listening_port = port;
        }
        if let Some(coordinator) = &self.coordinator {
            let (host, port) = parse_coordinator(coordinator)?;
            config.coordinator.host = host;
            config.coordinator.port = port;
        }
        if let Some(id) = self.worker_id {
            config.worker.proposed_id = Some(id);
        }
        config.validate().context("命令行参数覆盖后的配置无效")?;
        Ok(())
    }
}

/// 解析 `host:port` 形式的协调器地址
pub fn parse_coordinator(value: &str) -> Result<(String, u16)> {
    let (host, port) = value
        .rsplit_once(':')
        .ok_or_else(|| anyhow::anyhow!("协调器地址格式应为 host:port: {value}"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(anyhow::anyhow!("协调器主机名不能为空: {value}"));
    }
    let port = port
        .parse::<u16>()
        .with_context(|| format!("无效的协调器端口: {port}"))?;
    Ok((host.to_string(), port))
}
