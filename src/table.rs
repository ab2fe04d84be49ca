//! 封禁表
//!
//! 保存单地址与子网两张映射表，并维护误用封禁环形队列。
//!
//! # 优先级规则
//!
//! - 手动封禁不会被非手动封禁覆盖或缩短
//! - 同等原因下只有更晚的过期时间才会覆盖已有封禁
//! - 行为异常封禁可以被其他原因"升级"，升级后移出环形队列
//! - 队列满时淘汰最早的自动封禁，永远不会淘汰手动封禁

use crate::entry::{BanEntry, BanLevel, BanReason};
use crate::error::BanManError;
use crate::net::{BanKey, Subnet};
use crate::ring::MisbehaviorRing;
use ahash::AHashMap;
use std::net::IpAddr;
use tracing::debug;

/// 单次封禁操作的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanOutcome {
    /// 记录已写入；`evicted` 为因容量限制被删除的最早自动封禁
    Applied { evicted: Option<IpAddr> },
    /// 已有手动封禁，拒绝弱化
    RejectedByManual,
    /// 已有封禁更长（或同样长），保持不变
    Unchanged,
}

impl BanOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, BanOutcome::Applied { .. })
    }
}

/// 封禁表
#[derive(Debug, Default)]
pub struct BanTable {
    addrs: AHashMap<IpAddr, BanEntry>,
    subnets: AHashMap<Subnet, BanEntry>,
    misbehaving: MisbehaviorRing,
}

impl BanTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带有误用封禁容量限制的封禁表
    pub fn with_misbehaving_capacity(capacity: usize) -> Self {
        Self {
            misbehaving: MisbehaviorRing::new(capacity),
            ..Self::default()
        }
    }

    /// 设置误用封禁容量，只能在没有任何封禁时调用
    pub fn set_misbehaving_capacity(&mut self, capacity: usize) -> Result<(), BanManError> {
        if !self.is_empty() {
            return Err(BanManError::InvalidCapacityChange {
                existing: self.len(),
            });
        }
        self.misbehaving.set_capacity(capacity);
        Ok(())
    }

    pub fn misbehaving_capacity(&self) -> usize {
        self.misbehaving.capacity()
    }

    /// 环形队列中的地址（最早的在前）
    pub fn misbehaving_addrs(&self) -> Vec<IpAddr> {
        self.misbehaving.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.addrs.len() + self.subnets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty() && self.subnets.is_empty()
    }

    /// 按键查询记录（不区分是否过期）
    pub fn get(&self, key: &BanKey) -> Option<&BanEntry> {
        match BanKey::from(key.as_subnet()) {
            BanKey::Address(addr) => self.addrs.get(&addr),
            BanKey::Subnet(subnet) => self.subnets.get(&subnet),
        }
    }

    /// 写入一条封禁
    ///
    /// 单地址子网按地址处理，同一地址不会同时出现在两张表中。
    pub fn ban(&mut self, key: BanKey, entry: BanEntry) -> BanOutcome {
        let key = BanKey::from(key.as_subnet());
        let existing = self.get(&key).copied().unwrap_or_default();

        if existing.reason.is_manual() && !entry.reason.is_manual() {
            return BanOutcome::RejectedByManual;
        }

        let reason_upgrade = existing.reason.is_misbehaving() && !entry.reason.is_misbehaving();
        if existing.banned_until >= entry.banned_until && !reason_upgrade {
            return BanOutcome::Unchanged;
        }

        let mut evicted = None;
        if self.misbehaving.is_bounded() {
            if existing.banned_until != 0 {
                if reason_upgrade {
                    if let BanKey::Address(addr) = key {
                        self.misbehaving.remove(&addr);
                    }
                }
            } else if entry.reason.is_misbehaving() {
                if let BanKey::Address(addr) = key {
                    evicted = self.misbehaving.push(addr);
                    if let Some(oldest) = evicted {
                        self.addrs.remove(&oldest);
                        debug!(
                            "Removed banned node ip/subnet from banlist: {} (misbehaving ban overflow)",
                            oldest
                        );
                    }
                }
            }
        }

        match key {
            BanKey::Address(addr) => {
                self.addrs.insert(addr, entry);
            }
            BanKey::Subnet(subnet) => {
                self.subnets.insert(subnet, entry);
            }
        }

        BanOutcome::Applied { evicted }
    }

    /// 移除一条封禁，不存在时返回 `false`
    pub fn unban(&mut self, key: &BanKey) -> bool {
        match BanKey::from(key.as_subnet()) {
            BanKey::Address(addr) => match self.addrs.remove(&addr) {
                Some(entry) => {
                    if entry.reason.is_misbehaving() {
                        self.misbehaving.remove(&addr);
                    }
                    true
                }
                None => false,
            },
            BanKey::Subnet(subnet) => self.subnets.remove(&subnet).is_some(),
        }
    }

    /// 地址当前是否被封禁（单地址记录或任一包含它的子网记录）
    pub fn is_banned(&self, addr: &IpAddr, now: i64) -> bool {
        if self.addrs.get(addr).is_some_and(|e| e.is_active(now)) {
            return true;
        }
        self.subnets
            .iter()
            .any(|(subnet, entry)| entry.is_active(now) && subnet.contains(addr))
    }

    /// 子网当前是否被封禁；单地址子网按地址查询
    pub fn is_subnet_banned(&self, subnet: &Subnet, now: i64) -> bool {
        match subnet.single_addr() {
            Some(addr) => self.is_banned(&addr, now),
            None => self.subnets.get(subnet).is_some_and(|e| e.is_active(now)),
        }
    }

    /// 地址当前最严重的封禁级别，遍历所有匹配的子网
    pub fn ban_level(&self, addr: &IpAddr, now: i64) -> BanLevel {
        let mut level = BanLevel::None;

        if let Some(entry) = self.addrs.get(addr) {
            if entry.is_active(now) {
                level = level.max(BanLevel::from_reason(entry.reason));
            }
        }

        for (subnet, entry) in &self.subnets {
            if level == BanLevel::Other {
                break;
            }
            if entry.is_active(now) && subnet.contains(addr) {
                level = level.max(BanLevel::from_reason(entry.reason));
            }
        }

        level
    }

    /// 清除所有 `banned_until <= now` 的记录，返回被移除的键
    pub fn sweep(&mut self, now: i64) -> Vec<BanKey> {
        let mut removed = Vec::new();

        self.subnets.retain(|subnet, entry| {
            let keep = entry.is_active(now);
            if !keep {
                removed.push(BanKey::Subnet(*subnet));
            }
            keep
        });

        let mut expired_misbehaving = Vec::new();
        self.addrs.retain(|addr, entry| {
            let keep = entry.is_active(now);
            if !keep {
                removed.push(BanKey::Address(*addr));
                if entry.reason.is_misbehaving() {
                    expired_misbehaving.push(*addr);
                }
            }
            keep
        });

        for addr in &expired_misbehaving {
            self.misbehaving.remove(addr);
        }

        for key in &removed {
            debug!("Removed banned node ip/subnet from banlist: {}", key);
        }

        removed
    }

    /// 导出所有记录（按创建时间排序）
    pub fn snapshot(&self) -> Vec<(BanKey, BanEntry)> {
        let mut entries: Vec<(BanKey, BanEntry)> = self
            .addrs
            .iter()
            .map(|(addr, entry)| (BanKey::Address(*addr), *entry))
            .chain(
                self.subnets
                    .iter()
                    .map(|(subnet, entry)| (BanKey::Subnet(*subnet), *entry)),
            )
            .collect();

        entries.sort_by(|(ka, ea), (kb, eb)| {
            ea.created_at
                .cmp(&eb.created_at)
                .then_with(|| ka.to_string().cmp(&kb.to_string()))
        });
        entries
    }

    /// 用给定记录替换全部内容
    ///
    /// 环形队列按创建时间从行为异常的单地址记录重建；超出容量的最早记录
    /// 会被删除。返回被删除的地址。
    pub fn restore(&mut self, entries: Vec<(BanKey, BanEntry)>) -> Vec<IpAddr> {
        self.clear();

        for (key, entry) in entries {
            match BanKey::from(key.as_subnet()) {
                BanKey::Address(addr) => {
                    self.addrs.insert(addr, entry);
                }
                BanKey::Subnet(subnet) => {
                    self.subnets.insert(subnet, entry);
                }
            }
        }

        if !self.misbehaving.is_bounded() {
            return Vec::new();
        }

        let mut misbehaving: Vec<(IpAddr, i64)> = self
            .addrs
            .iter()
            .filter(|(_, entry)| entry.reason.is_misbehaving())
            .map(|(addr, entry)| (*addr, entry.created_at))
            .collect();
        misbehaving.sort_by(|(a, ta), (b, tb)| ta.cmp(tb).then_with(|| a.cmp(b)));

        let mut evicted = Vec::new();
        for (addr, _) in misbehaving {
            if let Some(oldest) = self.misbehaving.push(addr) {
                self.addrs.remove(&oldest);
                evicted.push(oldest);
            }
        }
        evicted
    }

    /// 清空所有记录与环形队列
    pub fn clear(&mut self) {
        self.addrs.clear();
        self.subnets.clear();
        self.misbehaving.clear();
    }
}
