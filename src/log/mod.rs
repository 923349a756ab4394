//! 日志模块
//!
//! 库内部通过 `tracing` 记录事件，这里负责初始化 `tracing_subscriber`。
//!
//! ```rust,no_run
//! use oss_adapter::log::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config: LogConfig = json5::from_str(r#"{ level: "debug", format: "json" }"#)?;
//!     init_logging(&config)?;
//!     Ok(())
//! }
//! ```

use std::str::FromStr;
use std::sync::OnceLock;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// 日志输出格式
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// tracing_subscriber 配置
#[derive(Debug, Clone, Deserialize, Serialize, SmartDefault, PartialEq)]
#[serde(default)]
pub struct LogConfig {
    /// 日志级别: "trace", "debug", "info", "warn", "error"
    #[default = "info"]
    pub level: String,

    /// 输出格式
    pub format: LogFormat,

    /// 是否输出 target
    #[default = true]
    pub with_target: bool,
}

impl LogConfig {
    /// 获取日志级别对应的 Level
    pub fn level(&self) -> Level {
        Level::from_str(self.level.to_lowercase().as_str()).unwrap_or(Level::INFO)
    }

    // RUST_LOG 优先，否则使用配置的级别
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str().to_lowercase()))
    }
}

/// 保证 init_logging 只被调用一次
static INIT_ONCE: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// 初始化全局 tracing_subscriber
///
/// 多次调用只会初始化一次，后续调用返回第一次初始化的结果。
pub fn init_logging(config: &LogConfig) -> Result<()> {
    INIT_ONCE
        .get_or_init(|| init_logging_inner(config).map_err(|e| e.to_string()))
        .clone()
        .map_err(|e| anyhow::anyhow!("{}", e))
}

fn init_logging_inner(config: &LogConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_target(config.with_target);

    match config.format {
        LogFormat::Text => builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("初始化 tracing_subscriber 失败: {}", e)),
        LogFormat::Json => builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("初始化 tracing_subscriber 失败: {}", e)),
    }
}
