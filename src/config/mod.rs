/// 统一配置系统
///
/// 提供TOML/JSON配置文件、环境变量覆盖与日志初始化
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

pub mod export;
pub mod skinning;

pub use export::ExportConfig;
pub use skinning::SkinningConfig;

use crate::animation::{LocalBoneAxis, MeshOrientation};

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 文件读取错误
    #[error("Config file error: {0}")]
    FileError(#[from] std::io::Error),
    /// 解析错误
    #[error("Config parse error: {0}")]
    ParseError(String),
    /// 验证错误
    #[error("Config validation error: {0}")]
    ValidationError(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// 骨骼子系统主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RigConfig {
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,

    /// 蒙皮配置
    #[serde(default)]
    pub skinning: SkinningConfig,

    /// 导出约定
    #[serde(default)]
    pub export: ExportConfig,
}

impl RigConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 从TOML文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_toml_str(&content)
    }

    /// 从TOML字符串解析配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 从JSON文件加载配置
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(ConfigError::FileError)?;
        Self::from_json_str(&content)
    }

    /// 从JSON字符串解析配置
    pub fn from_json_str(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 保存为TOML文件
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 保存为JSON文件
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        fs::write(path, content).map_err(ConfigError::FileError)
    }

    /// 从环境变量覆盖配置
    ///
    /// 无法解析的值被忽略并记录警告。
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("RIG_LOG_LEVEL") {
            match val.parse() {
                Ok(level) => self.logging.level = level,
                Err(_) => warn_ignored("RIG_LOG_LEVEL", &val),
            }
        }
        if let Ok(val) = env::var("RIG_MESH_ORIENTATION") {
            match MeshOrientation::from_str(&val) {
                Ok(orientation) => self.export.mesh_orientation = orientation,
                Err(_) => warn_ignored("RIG_MESH_ORIENTATION", &val),
            }
        }
        if let Ok(val) = env::var("RIG_LOCAL_BONE_AXIS") {
            match LocalBoneAxis::from_str(&val) {
                Ok(axis) => self.export.local_bone_axis = axis,
                Err(_) => warn_ignored("RIG_LOCAL_BONE_AXIS", &val),
            }
        }
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        self.export.validate()?;
        Ok(())
    }
}

fn warn_ignored(key: &str, value: &str) {
    tracing::warn!(target: "config", "Ignoring invalid value {:?} for {}", value, key);
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: LogLevel,

    /// 是否输出到控制台
    pub log_to_console: bool,
}

use crate::impl_default;

impl_default!(LoggingConfig {
    level: LogLevel::Info,
    log_to_console: true,
});

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// 跟踪
    Trace,
    /// 调试
    Debug,
    /// 信息
    Info,
    /// 警告
    Warn,
    /// 错误
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ConfigError::ParseError(format!("unknown log level {other}"))),
        }
    }
}

/// 安装 `tracing` 订阅者
///
/// 优先使用 `RUST_LOG`，否则使用配置中的级别。重复调用无副作用。
pub fn init_logging(config: &LoggingConfig) {
    if !config.log_to_console {
        return;
    }
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.as_str()));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
