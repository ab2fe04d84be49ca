//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 错误类型定义
//!
//! 使用thiserror定义所有错误类型。

use thiserror::Error;

/// 封禁管理器错误类型
#[derive(Error, Debug)]
pub enum BanManError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 存储错误
    #[error("存储错误: {0}")]
    StoreError(#[from] StoreError),

    /// 封禁已存在时修改误用封禁容量
    #[error("封禁列表非空时不能修改误用封禁容量 (当前封禁数: {existing})")]
    InvalidCapacityChange { existing: usize },

    /// 验证错误
    #[error("验证错误: {0}")]
    ValidationError(String),

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// YAML解析错误
    #[error("YAML解析错误: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML解析错误
    #[error("TOML解析错误: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// 持久化存储错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 未找到持久化数据
    #[error("未找到: {0}")]
    NotFound(String),

    /// 数据损坏或版本不兼容
    #[error("数据损坏: {0}")]
    Corrupt(String),

    /// 读写错误
    #[error("IO错误: {0}")]
    Io(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(err.to_string()),
            _ => StoreError::Io(err.to_string()),
        }
    }
}
