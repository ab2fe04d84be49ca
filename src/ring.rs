//! 误用封禁环形队列
//!
//! 按封禁顺序记录因行为异常被自动封禁的地址。队列满时弹出最早的地址，
//! 由调用方把对应的封禁记录一并删除。

use std::collections::VecDeque;
use std::net::IpAddr;

/// 有界FIFO队列
///
/// 容量为0表示不限制（也不跟踪）自动封禁。
#[derive(Debug, Clone, Default)]
pub struct MisbehaviorRing {
    addrs: VecDeque<IpAddr>,
    capacity: usize,
}

impl MisbehaviorRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            addrs: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 是否启用了容量限制
    pub fn is_bounded(&self) -> bool {
        self.capacity > 0
    }

    /// 设置容量
    ///
    /// 只能在队列为空时调用，调用方负责保证这一点。
    pub fn set_capacity(&mut self, capacity: usize) {
        debug_assert!(self.addrs.is_empty());
        self.capacity = capacity;
        self.addrs = VecDeque::with_capacity(capacity);
    }

    pub fn is_full(&self) -> bool {
        self.is_bounded() && self.addrs.len() >= self.capacity
    }

    /// 追加地址；队列已满时先弹出并返回最早的地址
    pub fn push(&mut self, addr: IpAddr) -> Option<IpAddr> {
        if !self.is_bounded() {
            return None;
        }

        let evicted = if self.is_full() {
            self.addrs.pop_front()
        } else {
            None
        };
        self.addrs.push_back(addr);
        evicted
    }

    /// 移除第一个匹配的地址，不存在时静默返回 `false`
    pub fn remove(&mut self, addr: &IpAddr) -> bool {
        match self.addrs.iter().position(|a| a == addr) {
            Some(index) => {
                self.addrs.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.addrs.contains(addr)
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }

    pub fn clear(&mut self) {
        self.addrs.clear();
    }

    /// 按封禁顺序遍历（最早的在前）
    pub fn iter(&self) -> impl Iterator<Item = &IpAddr> {
        self.addrs.iter()
    }
}
