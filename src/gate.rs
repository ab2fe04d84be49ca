//! 持久化闸门
//!
//! 记录内存中的封禁列表是否与最近一次成功写入的快照不同。
//!
//! 状态转换：
//! - 任意修改: `Clean -> Dirty`, `Dirty -> Dirty`
//! - 写入成功: `Dirty -> Clean`（仅当写入期间没有新的修改）
//! - 写入失败: `Dirty -> Dirty`

/// 闸门状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    /// 与持久化数据一致
    #[default]
    Clean,
    /// 需要写入
    Dirty,
}

/// 一次写入开始时的修改计数
///
/// 写入完成后只有计数未变化才会转为 `Clean`，避免写入期间发生的修改丢失。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushTicket {
    generation: u64,
}

/// 持久化闸门
#[derive(Debug, Default)]
pub struct PersistenceGate {
    state: GateState,
    generation: u64,
}

impl PersistenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == GateState::Dirty
    }

    pub fn mark_dirty(&mut self) {
        self.state = GateState::Dirty;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn mark_clean(&mut self) {
        self.state = GateState::Clean;
    }

    /// 开始一次写入；状态为 `Clean` 时返回 `None`
    pub fn begin_flush(&self) -> Option<FlushTicket> {
        self.is_dirty().then_some(FlushTicket {
            generation: self.generation,
        })
    }

    /// 写入成功后调用；返回是否转为 `Clean`
    pub fn complete_flush(&mut self, ticket: FlushTicket) -> bool {
        if self.generation == ticket.generation {
            self.state = GateState::Clean;
            true
        } else {
            false
        }
    }
}
