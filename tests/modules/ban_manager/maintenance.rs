//! 定期维护任务测试

use crate::common::{init_tracing, ip};
use peerban::{BanManager, BanManagerConfig, BanReason, MemoryBanStore, MockClock};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn create_manager(store: Arc<MemoryBanStore>, clock: Arc<MockClock>) -> Arc<BanManager> {
    init_tracing();
    let config = BanManagerConfig {
        flush_interval_secs: 1,
        ..Default::default()
    };

    Arc::new(
        BanManager::builder()
            .config(config)
            .store(store)
            .clock(clock)
            .build()
            .unwrap(),
    )
}

/// 测试维护任务定期写入脏状态
#[tokio::test]
async fn test_maintenance_flushes_dirty_state() {
    let store = Arc::new(MemoryBanStore::new());
    let clock = Arc::new(MockClock::new(1_000));
    let manager = create_manager(store.clone(), clock.clone());
    let handle = manager.spawn_maintenance();

    manager.ban_addr(ip("203.0.113.1"), BanReason::NodeMisbehaving, 60, false);
    assert!(manager.is_dirty());

    sleep(Duration::from_millis(2_500)).await;
    assert!(!manager.is_dirty());
    assert_eq!(store.stored().unwrap().len(), 1);

    handle.abort();
}

/// 测试维护任务清理过期记录
#[tokio::test]
async fn test_maintenance_sweeps_expired() {
    let store = Arc::new(MemoryBanStore::new());
    let clock = Arc::new(MockClock::new(1_000));
    let manager = create_manager(store.clone(), clock.clone());

    manager.ban_addr(ip("203.0.113.2"), BanReason::ManuallyAdded, 60, false);
    assert_eq!(store.stored().unwrap().len(), 1);

    let handle = manager.spawn_maintenance();
    clock.advance(120);

    sleep(Duration::from_millis(2_500)).await;
    assert!(manager.is_empty());
    assert_eq!(store.stored(), Some(Vec::new()));

    handle.abort();
}

/// 测试管理器释放后任务退出
#[tokio::test]
async fn test_maintenance_stops_when_manager_dropped() {
    let store = Arc::new(MemoryBanStore::new());
    let manager = create_manager(store.clone(), Arc::new(MockClock::new(1_000)));
    let handle = manager.spawn_maintenance();

    manager.ban_addr(ip("203.0.113.3"), BanReason::NodeMisbehaving, 60, false);
    drop(manager);
    // 释放时已写入
    assert_eq!(store.stored().unwrap().len(), 1);

    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("maintenance task should stop")
        .unwrap();
}
