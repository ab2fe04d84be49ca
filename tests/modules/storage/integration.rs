//! 文件存储集成测试
//!
//! 测试封禁管理器与JSON文件存储的配合

use crate::common::{create_manager, ip};
use peerban::{
    BanKey, BanManager, BanManagerConfig, BanOutcome, BanReason, BanStore, JsonFileBanStore,
    MockClock, ReasonCode, Subnet,
};
use std::fs;
use std::sync::Arc;

/// 测试封禁在重启后保留
#[test]
fn test_bans_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("banlist.json");
    let clock = Arc::new(MockClock::new(1_000));

    {
        let manager = create_manager(Arc::new(JsonFileBanStore::new(&path)), clock.clone());
        manager.ban_addr(ip("198.51.100.7"), BanReason::ManuallyAdded, 600, false);
        manager.ban_subnet(
            "198.18.0.0/15".parse().unwrap(),
            BanReason::NodeMisbehaving,
            600,
            false,
        );
        manager.shutdown();
    }

    let manager = create_manager(Arc::new(JsonFileBanStore::new(&path)), clock);
    assert!(manager.is_banned(&ip("198.51.100.7")));
    assert!(manager.is_banned(&ip("198.19.1.1")));
    assert_eq!(manager.len(), 2);
    assert!(!manager.is_dirty());
}

/// 测试损坏的文件会被重建
#[test]
fn test_corrupt_file_is_recreated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("banlist.json");
    fs::write(&path, "definitely not json").unwrap();

    let store = Arc::new(JsonFileBanStore::new(&path));
    let manager = create_manager(store.clone(), Arc::new(MockClock::new(1_000)));

    assert!(manager.is_empty());
    assert!(!manager.is_dirty());
    assert_eq!(store.read().unwrap(), Vec::new());
}

/// 测试缺失的文件会被创建
#[test]
fn test_missing_file_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("banlist.json");
    assert!(!path.exists());

    let _manager = create_manager(
        Arc::new(JsonFileBanStore::new(&path)),
        Arc::new(MockClock::new(1_000)),
    );
    assert!(path.exists());
}

/// 测试已过期的记录在加载时被清理并重写文件
#[test]
fn test_expired_entries_dropped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("banlist.json");
    fs::write(
        &path,
        r#"{
  "version": 1,
  "bans": [
    {"key": "192.0.2.1", "created_at": 10, "banned_until": 20, "reason": 1},
    {"key": "192.0.2.0/24", "created_at": 10, "banned_until": 5000, "reason": 2}
  ]
}"#,
    )
    .unwrap();

    let store = Arc::new(JsonFileBanStore::new(&path));
    let manager = create_manager(store.clone(), Arc::new(MockClock::new(1_000)));

    assert_eq!(manager.len(), 1);
    assert!(manager.is_dirty());
    assert!(manager.flush_if_dirty().unwrap());

    let stored = store.read().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, "192.0.2.0/24".parse::<BanKey>().unwrap());
}

/// 测试未指定存储时按配置使用文件存储
#[test]
fn test_builder_uses_configured_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("configured.json");

    let config = BanManagerConfig {
        ban_file: Some(path.clone()),
        ..Default::default()
    };
    let manager = BanManager::builder().config(config).build().unwrap();
    manager.ban_addr(ip("192.0.2.99"), BanReason::ManuallyAdded, 600, false);

    let stored = JsonFileBanStore::new(&path).read().unwrap();
    assert_eq!(stored.len(), 1);
}

/// 测试自定义原因在重启后保持不变，且仍可被更长的自动封禁覆盖
#[test]
fn test_custom_reason_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("banlist.json");
    let clock = Arc::new(MockClock::new(1_000));
    let addr = ip("198.51.100.20");
    let reason = BanReason::custom(ReasonCode::MIN).unwrap();

    {
        let manager = create_manager(Arc::new(JsonFileBanStore::new(&path)), clock.clone());
        manager.ban_addr(addr, reason, 600, false);
        manager.shutdown();
    }

    let manager = create_manager(Arc::new(JsonFileBanStore::new(&path)), clock);
    let entries = manager.list_banned();
    assert_eq!(entries[0].1.reason, reason);

    let outcome = manager.ban_addr(addr, BanReason::NodeMisbehaving, 6_000, false);
    assert!(outcome.is_applied());
    assert_ne!(outcome, BanOutcome::RejectedByManual);
}

/// 测试单地址子网封禁与地址封禁写入同一条记录
#[test]
fn test_single_address_subnet_persisted_as_address() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("banlist.json");
    let clock = Arc::new(MockClock::new(1_000));
    let addr = ip("198.51.100.30");

    let manager = create_manager(Arc::new(JsonFileBanStore::new(&path)), clock);
    manager.ban(
        BanKey::Subnet(Subnet::single(addr)),
        BanReason::ManuallyAdded,
        600,
        false,
    );
    manager.ban_addr(addr, BanReason::ManuallyAdded, 900, false);
    manager.shutdown();

    let stored = JsonFileBanStore::new(&path).read().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0, BanKey::Address(addr));
    assert_eq!(stored[0].1.banned_until, 1_900);
}
