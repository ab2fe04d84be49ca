//! 封禁管理器
//!
//! 对外提供封禁、解封、查询与持久化操作。
//!
//! # 功能
//!
//! - 单地址与子网封禁，手动封禁优先于自动封禁
//! - 误用封禁容量限制，超出时淘汰最早的自动封禁
//! - 封禁列表变化时才写入存储，手动封禁与解封立即写入
//! - 所有存储IO与观察者通知都在释放锁之后进行
//! - 定期清理与写入任务（`runtime` 特性）

use crate::clock::{Clock, SystemClock};
use crate::config::BanManagerConfig;
use crate::constants::LOADING_BANLIST_MESSAGE;
use crate::entry::{BanEntry, BanLevel, BanReason};
use crate::error::BanManError;
use crate::gate::{FlushTicket, PersistenceGate};
use crate::net::{BanKey, Subnet};
use crate::observer::{BanObserver, NoopObserver};
use crate::storage::{BanStore, JsonFileBanStore, MemoryBanStore};
use crate::table::{BanOutcome, BanTable};
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// 锁保护的状态：封禁表（含环形队列）与持久化闸门
#[derive(Debug, Default)]
struct BanState {
    table: BanTable,
    gate: PersistenceGate,
}

impl BanState {
    /// 清理过期记录，返回是否有记录被移除
    fn sweep(&mut self, now: i64) -> bool {
        let removed = self.table.sweep(now);
        if removed.is_empty() {
            return false;
        }
        self.gate.mark_dirty();
        true
    }
}

/// 封禁管理器构建器
pub struct BanManagerBuilder {
    config: BanManagerConfig,
    store: Option<Arc<dyn BanStore>>,
    observer: Arc<dyn BanObserver>,
    clock: Arc<dyn Clock>,
}

impl Default for BanManagerBuilder {
    fn default() -> Self {
        Self {
            config: BanManagerConfig::default(),
            store: None,
            observer: Arc::new(NoopObserver),
            clock: Arc::new(SystemClock),
        }
    }
}

impl BanManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: BanManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置存储；未设置时按配置中的 `ban_file` 选择文件存储或内存存储
    pub fn store(mut self, store: Arc<dyn BanStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn BanObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// 校验配置并加载封禁列表
    pub fn build(self) -> Result<BanManager, BanManError> {
        self.config.validate()?;

        let store: Arc<dyn BanStore> = match self.store {
            Some(store) => store,
            None => match &self.config.ban_file {
                Some(path) => Arc::new(JsonFileBanStore::new(path)),
                None => Arc::new(MemoryBanStore::new()),
            },
        };

        let manager = BanManager {
            state: Mutex::new(BanState {
                table: BanTable::with_misbehaving_capacity(self.config.misbehaving_capacity),
                gate: PersistenceGate::new(),
            }),
            flush_lock: Mutex::new(()),
            store,
            observer: self.observer,
            clock: self.clock,
            config: self.config,
        };

        manager.load();
        Ok(manager)
    }
}

/// 封禁管理器
///
/// 一把互斥锁同时保护封禁表、环形队列与持久化闸门。
pub struct BanManager {
    state: Mutex<BanState>,
    /// 保证同一时刻只有一次写入
    flush_lock: Mutex<()>,
    store: Arc<dyn BanStore>,
    observer: Arc<dyn BanObserver>,
    clock: Arc<dyn Clock>,
    config: BanManagerConfig,
}

impl std::fmt::Debug for BanManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BanManager")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl BanManager {
    pub fn builder() -> BanManagerBuilder {
        BanManagerBuilder::new()
    }

    /// 使用给定存储与观察者启动封禁管理器
    ///
    /// # 示例
    /// ```rust
    /// use peerban::{BanManager, BanManagerConfig, MemoryBanStore, NoopObserver};
    /// use std::sync::Arc;
    ///
    /// let manager = BanManager::start(
    ///     BanManagerConfig::default(),
    ///     Arc::new(MemoryBanStore::new()),
    ///     Arc::new(NoopObserver),
    /// )
    /// .unwrap();
    /// assert!(manager.is_empty());
    /// ```
    pub fn start(
        config: BanManagerConfig,
        store: Arc<dyn BanStore>,
        observer: Arc<dyn BanObserver>,
    ) -> Result<Self, BanManError> {
        BanManagerBuilder::new()
            .config(config)
            .store(store)
            .observer(observer)
            .build()
    }

    /// 初始加载
    ///
    /// 读取失败（文件缺失或损坏）时从空列表开始，并立即写入以重建存储。
    fn load(&self) {
        self.observer.on_initializing(LOADING_BANLIST_MESSAGE);
        let started = Instant::now();

        match self.store.read() {
            Ok(entries) => {
                let count = entries.len();
                {
                    let mut state = self.state.lock();
                    let evicted = state.table.restore(entries);
                    state.gate.mark_clean();
                    if !evicted.is_empty() {
                        warn!(
                            "Dropped {} misbehaving bans exceeding capacity on load",
                            evicted.len()
                        );
                        state.gate.mark_dirty();
                    }
                }
                self.sweep();

                info!(
                    "Loaded {} banned ips/subnets from store in {}ms",
                    count,
                    started.elapsed().as_millis()
                );
            }
            Err(e) => {
                warn!("Invalid or missing banlist ({}); recreating", e);
                self.state.lock().gate.mark_dirty();
                self.flush_quietly();
            }
        }
    }

    pub fn config(&self) -> &BanManagerConfig {
        &self.config
    }

    /// 计算请求的过期时间
    ///
    /// `offset_secs` 不为正数时使用默认时长（相对当前时间）。
    fn requested_until(&self, now: i64, offset_secs: i64, absolute: bool) -> i64 {
        let (offset, absolute) = if offset_secs <= 0 {
            (self.config.default_ban_time_secs, false)
        } else {
            (offset_secs, absolute)
        };
        let base = if absolute { 0 } else { now };
        base.saturating_add(offset)
    }

    /// 封禁地址或子网
    ///
    /// # 参数
    /// - `key`: 封禁键
    /// - `reason`: 封禁原因
    /// - `offset_secs`: 封禁时长（秒），或 `absolute` 为真时的Unix过期时间
    /// - `absolute`: `offset_secs` 是否为绝对时间
    ///
    /// # 返回
    /// - 封禁表的处理结果
    #[instrument(skip(self))]
    pub fn ban(
        &self,
        key: BanKey,
        reason: BanReason,
        offset_secs: i64,
        absolute: bool,
    ) -> BanOutcome {
        let key = BanKey::from(key.as_subnet());
        let now = self.clock.now();
        let banned_until = self.requested_until(now, offset_secs, absolute);

        if banned_until <= now {
            debug!("Ignoring already expired ban: until={}", banned_until);
            return BanOutcome::Unchanged;
        }

        let outcome = {
            let mut state = self.state.lock();
            let outcome = state
                .table
                .ban(key, BanEntry::new(now, banned_until, reason));
            if outcome.is_applied() {
                state.gate.mark_dirty();
            }
            outcome
        };

        match outcome {
            BanOutcome::Applied { evicted } => {
                if let Some(oldest) = evicted {
                    info!("Evicted oldest misbehaving ban: {}", oldest);
                }
                debug!("Ban applied: until={}", banned_until);
                self.notify_changed();

                if reason.is_manual() {
                    self.flush_quietly();
                }
            }
            BanOutcome::RejectedByManual => {
                debug!("Ban rejected: existing manual ban takes precedence");
            }
            BanOutcome::Unchanged => {
                debug!("Ban unchanged: existing ban lasts longer");
            }
        }

        outcome
    }

    /// 封禁单个地址
    pub fn ban_addr(
        &self,
        addr: IpAddr,
        reason: BanReason,
        offset_secs: i64,
        absolute: bool,
    ) -> BanOutcome {
        self.ban(BanKey::Address(addr), reason, offset_secs, absolute)
    }

    /// 封禁子网（单地址子网按地址处理）
    pub fn ban_subnet(
        &self,
        subnet: Subnet,
        reason: BanReason,
        offset_secs: i64,
        absolute: bool,
    ) -> BanOutcome {
        self.ban(BanKey::from(subnet), reason, offset_secs, absolute)
    }

    /// 解封
    ///
    /// # 返回
    /// - 是否有记录被移除；不存在时不做任何修改也不通知
    #[instrument(skip(self))]
    pub fn unban(&self, key: BanKey) -> bool {
        let key = BanKey::from(key.as_subnet());
        {
            let mut state = self.state.lock();
            if !state.table.unban(&key) {
                debug!("No ban found");
                return false;
            }
            state.gate.mark_dirty();
        }

        info!("Unbanned {}", key);
        self.notify_changed();
        self.flush_quietly();
        true
    }

    /// 地址当前是否被封禁
    pub fn is_banned(&self, addr: &IpAddr) -> bool {
        let now = self.clock.now();
        self.state.lock().table.is_banned(addr, now)
    }

    /// 子网当前是否被封禁
    pub fn is_subnet_banned(&self, subnet: &Subnet) -> bool {
        let now = self.clock.now();
        self.state.lock().table.is_subnet_banned(subnet, now)
    }

    /// 地址当前最严重的封禁级别
    pub fn ban_level(&self, addr: &IpAddr) -> BanLevel {
        let now = self.clock.now();
        self.state.lock().table.ban_level(addr, now)
    }

    /// 清理过期记录后导出所有封禁
    pub fn list_banned(&self) -> Vec<(BanKey, BanEntry)> {
        self.sweep();
        self.state.lock().table.snapshot()
    }

    /// 用给定记录替换全部封禁
    #[instrument(skip(self, entries), fields(count = entries.len()))]
    pub fn replace_all(&self, entries: Vec<(BanKey, BanEntry)>) {
        {
            let mut state = self.state.lock();
            let evicted = state.table.restore(entries);
            if !evicted.is_empty() {
                warn!(
                    "Dropped {} misbehaving bans exceeding capacity",
                    evicted.len()
                );
            }
            state.gate.mark_dirty();
        }
        self.notify_changed();
    }

    /// 清空所有封禁并立即写入
    #[instrument(skip(self))]
    pub fn clear_all(&self) {
        {
            let mut state = self.state.lock();
            state.table.clear();
            state.gate.mark_dirty();
        }
        info!("Cleared all bans");
        self.flush_quietly();
        self.notify_changed();
    }

    /// 设置误用封禁容量
    ///
    /// 只能在没有任何封禁时调用，否则说明启动顺序有误。
    pub fn set_misbehaving_capacity(&self, capacity: usize) -> Result<(), BanManError> {
        self.state
            .lock()
            .table
            .set_misbehaving_capacity(capacity)
            .map_err(|e| {
                error!("Misbehaving capacity change rejected: {}", e);
                e
            })
    }

    pub fn misbehaving_capacity(&self) -> usize {
        self.state.lock().table.misbehaving_capacity()
    }

    /// 清理过期记录
    ///
    /// # 返回
    /// - 是否有记录被移除
    pub fn sweep(&self) -> bool {
        let now = self.clock.now();
        let changed = self.state.lock().sweep(now);
        if changed {
            self.notify_changed();
        }
        changed
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().gate.is_dirty()
    }

    pub fn len(&self) -> usize {
        self.state.lock().table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().table.is_empty()
    }

    /// 有未写入的修改时清理并写入存储
    ///
    /// # 返回
    /// - `Ok(true)`: 已写入
    /// - `Ok(false)`: 无需写入
    /// - `Err(_)`: 写入失败，保持脏状态等待下次写入
    #[instrument(skip(self))]
    pub fn flush_if_dirty(&self) -> Result<bool, BanManError> {
        let (swept, result) = {
            let _flush = self.flush_lock.lock();
            let now = self.clock.now();

            let (swept, pending) = {
                let mut state = self.state.lock();
                let swept = state.sweep(now);
                let pending = state
                    .gate
                    .begin_flush()
                    .map(|ticket| (ticket, state.table.snapshot()));
                (swept, pending)
            };

            let result = match pending {
                Some((ticket, entries)) => self.write_snapshot(ticket, entries),
                None => Ok(false),
            };
            (swept, result)
        };

        if swept {
            self.notify_changed();
        }
        result
    }

    fn write_snapshot(
        &self,
        ticket: FlushTicket,
        entries: Vec<(BanKey, BanEntry)>,
    ) -> Result<bool, BanManError> {
        let started = Instant::now();

        if let Err(e) = self.store.write(&entries) {
            warn!("Failed to flush banlist, will retry later: {}", e);
            return Err(e.into());
        }

        if !self.state.lock().gate.complete_flush(ticket) {
            debug!("Banlist changed during flush; staying dirty");
        }

        debug!(
            "Flushed {} banned ips/subnets in {}ms",
            entries.len(),
            started.elapsed().as_millis()
        );
        Ok(true)
    }

    /// 写入失败只记录日志
    fn flush_quietly(&self) {
        let _ = self.flush_if_dirty();
    }

    fn notify_changed(&self) {
        self.observer.on_ban_set_changed();
    }

    /// 关闭前最后一次写入
    #[instrument(skip(self))]
    pub fn shutdown(&self) {
        match self.flush_if_dirty() {
            Ok(_) => info!("BanManager shut down"),
            Err(e) => error!("Final banlist flush failed: {}", e),
        }
    }

    /// 启动定期清理与写入任务
    ///
    /// 任务只持有弱引用，管理器被释放后自动退出。
    #[cfg(feature = "runtime")]
    pub fn spawn_maintenance(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let weak = Arc::downgrade(self);
        let period = self.config.flush_interval();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // 第一次tick立即返回
            interval.tick().await;

            loop {
                interval.tick().await;
                let Some(manager) = weak.upgrade() else {
                    debug!("BanManager dropped, stopping maintenance task");
                    break;
                };

                debug!("Running banlist maintenance");
                let result = tokio::task::spawn_blocking(move || manager.flush_if_dirty()).await;
                if let Err(e) = result {
                    error!("Banlist maintenance task failed: {}", e);
                }
            }
        });

        info!("Banlist maintenance task started (interval: {:?})", period);
        handle
    }
}

impl Drop for BanManager {
    fn drop(&mut self) {
        if let Err(e) = self.flush_if_dirty() {
            error!("Banlist flush on drop failed: {}", e);
        }
    }
}
