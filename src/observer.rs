//! 封禁事件观察者
//!
//! 封禁管理器在释放锁之后才调用观察者，观察者可以安全地回调管理器。

/// 封禁事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BanEvent {
    /// 开始加载封禁列表
    Initializing(String),
    /// 生效的封禁集合发生了变化（新增、升级、移除、过期清理、清空）
    BanSetChanged,
}

/// 观察者接口
pub trait BanObserver: Send + Sync {
    /// 初始加载前调用一次
    fn on_initializing(&self, _message: &str) {}

    /// 封禁集合变化后调用（至少一次语义）
    fn on_ban_set_changed(&self) {}
}

/// 不做任何事的观察者
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl BanObserver for NoopObserver {}

/// 回调观察者
pub struct FnObserver<F>
where
    F: Fn(BanEvent) + Send + Sync,
{
    callback: F,
}

impl<F> FnObserver<F>
where
    F: Fn(BanEvent) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> BanObserver for FnObserver<F>
where
    F: Fn(BanEvent) + Send + Sync,
{
    fn on_initializing(&self, message: &str) {
        (self.callback)(BanEvent::Initializing(message.to_string()));
    }

    fn on_ban_set_changed(&self) {
        (self.callback)(BanEvent::BanSetChanged);
    }
}

/// 通过tokio广播通道转发事件的观察者
#[cfg(feature = "runtime")]
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    sender: tokio::sync::broadcast::Sender<BanEvent>,
}

#[cfg(feature = "runtime")]
impl BroadcastObserver {
    /// 创建观察者
    ///
    /// # 参数
    /// - `capacity`: 通道容量，慢订阅者会丢失最早的事件
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BanEvent> {
        self.sender.subscribe()
    }

    fn send(&self, event: BanEvent) {
        // 没有订阅者时发送失败，直接丢弃
        let _ = self.sender.send(event);
    }
}

#[cfg(feature = "runtime")]
impl BanObserver for BroadcastObserver {
    fn on_initializing(&self, message: &str) {
        self.send(BanEvent::Initializing(message.to_string()));
    }

    fn on_ban_set_changed(&self) {
        self.send(BanEvent::BanSetChanged);
    }
}
