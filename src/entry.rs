//! 封禁记录
//!
//! 封禁原因、封禁记录以及封禁级别。

use crate::error::BanManError;
use serde::{Deserialize, Serialize};

/// 自定义封禁原因编码
///
/// `0..=2` 保留给内置原因，自定义编码从 [`ReasonCode::MIN`] 开始，
/// 保证持久化后读回的仍是同一个原因。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReasonCode(u8);

impl ReasonCode {
    /// 最小的自定义编码
    pub const MIN: u8 = 3;

    pub fn new(code: u8) -> Result<Self, BanManError> {
        if code < Self::MIN {
            return Err(BanManError::ValidationError(format!(
                "封禁原因编码 {} 为内置保留编码",
                code
            )));
        }
        Ok(Self(code))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// 封禁原因
///
/// 只有 [`BanReason::NodeMisbehaving`] 与 [`BanReason::ManuallyAdded`] 参与
/// 优先级判断，其余原因都按 [`BanReason::Unknown`] 处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum BanReason {
    /// 未知原因
    #[default]
    Unknown,
    /// 节点行为异常（自动封禁）
    NodeMisbehaving,
    /// 手动封禁
    ManuallyAdded,
    /// 调用方自定义原因
    Other(ReasonCode),
}

impl BanReason {
    /// 自定义原因，编码不能与内置原因重复
    pub fn custom(code: u8) -> Result<Self, BanManError> {
        ReasonCode::new(code).map(BanReason::Other)
    }

    /// 持久化编码
    pub fn code(self) -> u8 {
        match self {
            BanReason::Unknown => 0,
            BanReason::NodeMisbehaving => 1,
            BanReason::ManuallyAdded => 2,
            BanReason::Other(code) => code.get(),
        }
    }

    pub fn is_misbehaving(self) -> bool {
        matches!(self, BanReason::NodeMisbehaving)
    }

    pub fn is_manual(self) -> bool {
        matches!(self, BanReason::ManuallyAdded)
    }
}

impl From<u8> for BanReason {
    fn from(code: u8) -> Self {
        match code {
            0 => BanReason::Unknown,
            1 => BanReason::NodeMisbehaving,
            2 => BanReason::ManuallyAdded,
            other => BanReason::Other(ReasonCode(other)),
        }
    }
}

impl From<BanReason> for u8 {
    fn from(reason: BanReason) -> Self {
        reason.code()
    }
}

/// 封禁记录
///
/// 时间均为Unix时间戳（秒）。`now < banned_until` 时封禁处于生效状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BanEntry {
    /// 创建时间
    pub created_at: i64,
    /// 过期时间
    pub banned_until: i64,
    /// 封禁原因
    pub reason: BanReason,
}

impl BanEntry {
    pub fn new(created_at: i64, banned_until: i64, reason: BanReason) -> Self {
        Self {
            created_at,
            banned_until,
            reason,
        }
    }

    /// 是否在 `now` 时刻仍然生效
    pub fn is_active(&self, now: i64) -> bool {
        now < self.banned_until
    }
}

/// 封禁级别
///
/// 数值越大越严重，多条匹配记录取最大值。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum BanLevel {
    /// 未封禁
    #[default]
    None = 0,
    /// 仅因行为异常被自动封禁
    Misbehaving = 1,
    /// 手动封禁或其他原因
    Other = 2,
}

impl BanLevel {
    /// 单条生效记录对应的级别
    pub fn from_reason(reason: BanReason) -> Self {
        if reason.is_misbehaving() {
            BanLevel::Misbehaving
        } else {
            BanLevel::Other
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
