//! 配置模块
//!
//! 定义封禁管理器的配置结构，支持YAML、TOML与JSON格式。

use crate::constants::{
    DEFAULT_BANLIST_FILE_NAME, DEFAULT_BAN_TIME_SECS, DEFAULT_FLUSH_INTERVAL_SECS,
    DEFAULT_MISBEHAVING_CAPACITY,
};
use crate::error::BanManError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 封禁管理器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BanManagerConfig {
    /// 默认封禁时长（秒），请求时长不为正数时使用
    pub default_ban_time_secs: i64,
    /// 误用封禁容量，0表示不限制
    pub misbehaving_capacity: usize,
    /// 封禁列表文件路径
    pub ban_file: Option<PathBuf>,
    /// 定期清理与写入的间隔（秒）
    pub flush_interval_secs: u64,
}

impl Default for BanManagerConfig {
    fn default() -> Self {
        Self {
            default_ban_time_secs: DEFAULT_BAN_TIME_SECS,
            misbehaving_capacity: DEFAULT_MISBEHAVING_CAPACITY,
            ban_file: None,
            flush_interval_secs: DEFAULT_FLUSH_INTERVAL_SECS,
        }
    }
}

impl BanManagerConfig {
    /// 校验配置
    pub fn validate(&self) -> Result<(), BanManError> {
        if self.default_ban_time_secs <= 0 {
            return Err(BanManError::ConfigError(format!(
                "默认封禁时长必须为正数: {}",
                self.default_ban_time_secs
            )));
        }

        if self.flush_interval_secs == 0 {
            return Err(BanManError::ConfigError("写入间隔不能为0".to_string()));
        }

        if let Some(path) = &self.ban_file {
            if path.as_os_str().is_empty() {
                return Err(BanManError::ConfigError(
                    "封禁列表文件路径不能为空".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// 将封禁列表放在数据目录下的默认文件中
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.ban_file = Some(dir.as_ref().join(DEFAULT_BANLIST_FILE_NAME));
        self
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// 从YAML字符串解析并校验
    pub fn from_yaml_str(s: &str) -> Result<Self, BanManError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// 从TOML字符串解析并校验
    pub fn from_toml_str(s: &str) -> Result<Self, BanManError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// 从JSON字符串解析并校验
    pub fn from_json_str(s: &str) -> Result<Self, BanManError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载，格式由扩展名决定
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BanManError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            _ => Err(BanManError::ConfigError(format!(
                "不支持的配置文件格式: {}",
                path.display()
            ))),
        }
    }
}
