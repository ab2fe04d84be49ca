//! 封禁管理器集成测试
//!
//! 覆盖优先级规则、容量淘汰、过期清理与持久化时机

use crate::common::{create_env, create_env_with_store, ip};
use peerban::{
    BanEntry, BanEvent, BanKey, BanLevel, BanOutcome, BanReason, MemoryBanStore, Subnet,
};
use std::sync::Arc;

/// 测试初始化事件在加载前发出
#[test]
fn test_initializing_event_emitted_first() {
    let env = create_env(0);
    let events = env.events.lock().clone();
    assert_eq!(
        events.first(),
        Some(&BanEvent::Initializing("Loading banlist...".to_string()))
    );
}

/// 测试自动封禁不能覆盖手动封禁
#[test]
fn test_automatic_ban_cannot_override_manual() {
    let env = create_env(0);
    let addr = ip("198.51.100.1");

    env.manager
        .ban_addr(addr, BanReason::ManuallyAdded, 100, false);
    let outcome = env
        .manager
        .ban_addr(addr, BanReason::NodeMisbehaving, 10_000, false);

    assert_eq!(outcome, BanOutcome::RejectedByManual);
    let entries = env.manager.list_banned();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1.reason, BanReason::ManuallyAdded);
    assert_eq!(entries[0].1.banned_until, 1_100);
}

/// 测试手动封禁替换自动封禁并且只延长不缩短
#[test]
fn test_manual_ban_replaces_and_extends() {
    let env = create_env(0);
    let addr = ip("198.51.100.2");

    env.manager
        .ban_addr(addr, BanReason::NodeMisbehaving, 500, false);
    let outcome = env
        .manager
        .ban_addr(addr, BanReason::ManuallyAdded, 100, false);
    assert!(outcome.is_applied());
    assert_eq!(env.manager.ban_level(&addr), BanLevel::Other);

    // 更短的手动封禁不生效
    let outcome = env
        .manager
        .ban_addr(addr, BanReason::ManuallyAdded, 50, false);
    assert_eq!(outcome, BanOutcome::Unchanged);

    let outcome = env
        .manager
        .ban_addr(addr, BanReason::ManuallyAdded, 900, false);
    assert!(outcome.is_applied());
    assert_eq!(env.manager.list_banned()[0].1.banned_until, 1_900);
}

/// 测试容量为2时按时间顺序淘汰最早的自动封禁
#[test]
fn test_misbehaving_capacity_evicts_oldest() {
    let env = create_env_with_store(Arc::new(MemoryBanStore::new()), 2, 0);
    let (a, b, c) = (ip("10.1.0.1"), ip("10.1.0.2"), ip("10.1.0.3"));

    env.manager
        .ban_addr(a, BanReason::NodeMisbehaving, 60, false);
    env.clock.set(1);
    env.manager
        .ban_addr(b, BanReason::NodeMisbehaving, 60, false);
    env.clock.set(2);
    let outcome = env
        .manager
        .ban_addr(c, BanReason::NodeMisbehaving, 60, false);

    assert_eq!(outcome, BanOutcome::Applied { evicted: Some(a) });
    assert!(!env.manager.is_banned(&a));
    assert!(env.manager.is_banned(&b));
    assert!(env.manager.is_banned(&c));
    assert_eq!(
        env.manager.list_banned(),
        vec![
            (BanKey::Address(b), BanEntry::new(1, 61, BanReason::NodeMisbehaving)),
            (BanKey::Address(c), BanEntry::new(2, 62, BanReason::NodeMisbehaving)),
        ]
    );
}

/// 测试手动封禁不计入容量
#[test]
fn test_manual_bans_do_not_count_towards_capacity() {
    let env = create_env(1);

    env.manager
        .ban_addr(ip("10.2.0.1"), BanReason::ManuallyAdded, 60, false);
    env.manager
        .ban_addr(ip("10.2.0.2"), BanReason::ManuallyAdded, 60, false);
    env.manager
        .ban_addr(ip("10.2.0.3"), BanReason::NodeMisbehaving, 60, false);

    assert_eq!(env.manager.len(), 3);

    let outcome = env
        .manager
        .ban_addr(ip("10.2.0.4"), BanReason::NodeMisbehaving, 60, false);
    assert_eq!(
        outcome,
        BanOutcome::Applied {
            evicted: Some(ip("10.2.0.3"))
        }
    );
    assert_eq!(env.manager.len(), 3);
}

/// 测试子网封禁覆盖其中的地址
#[test]
fn test_subnet_ban_covers_addresses() {
    let env = create_env(0);
    let subnet: Subnet = "2001:db8::/32".parse().unwrap();

    env.manager
        .ban_subnet(subnet, BanReason::ManuallyAdded, 60, false);

    assert!(env.manager.is_banned(&ip("2001:db8::1")));
    assert!(!env.manager.is_banned(&ip("2001:db9::1")));
    assert!(env.manager.is_subnet_banned(&subnet));
    assert!(!env
        .manager
        .is_subnet_banned(&"2001:db8:1::/48".parse().unwrap()));
    assert_eq!(env.manager.ban_level(&ip("2001:db8::1")), BanLevel::Other);
}

/// 测试同时命中自动与手动封禁时返回最严重的级别
#[test]
fn test_ban_level_takes_most_severe() {
    let env = create_env(0);
    let addr = ip("172.16.5.5");

    env.manager
        .ban_addr(addr, BanReason::NodeMisbehaving, 60, false);
    assert_eq!(env.manager.ban_level(&addr), BanLevel::Misbehaving);

    env.manager.ban_subnet(
        "172.16.0.0/12".parse().unwrap(),
        BanReason::ManuallyAdded,
        60,
        false,
    );
    assert_eq!(env.manager.ban_level(&addr), BanLevel::Other);
    assert_eq!(env.manager.ban_level(&ip("8.8.8.8")), BanLevel::None);
}

/// 测试过期后不再被封禁，清理后从列表中移除
#[test]
fn test_expiry_and_sweep() {
    let env = create_env(0);
    let addr = ip("192.0.2.10");

    env.manager
        .ban_addr(addr, BanReason::NodeMisbehaving, 30, false);
    env.clock.advance(29);
    assert!(env.manager.is_banned(&addr));

    env.clock.advance(1);
    assert!(!env.manager.is_banned(&addr));
    assert_eq!(env.manager.len(), 1);

    let before = env.changes();
    assert!(env.list_is_empty());
    assert_eq!(env.changes(), before + 1);
}

/// 测试只有手动封禁、解封与清空会立即写入
#[test]
fn test_persistence_timing() {
    let env = create_env(0);
    let initial = env.store.write_count();

    env.manager
        .ban_addr(ip("192.0.2.1"), BanReason::NodeMisbehaving, 60, false);
    assert_eq!(env.store.write_count(), initial);

    env.manager.unban(BanKey::Address(ip("192.0.2.1")));
    assert_eq!(env.store.write_count(), initial + 1);

    env.manager
        .ban_addr(ip("192.0.2.2"), BanReason::ManuallyAdded, 60, false);
    assert_eq!(env.store.write_count(), initial + 2);

    env.manager.clear_all();
    assert_eq!(env.store.write_count(), initial + 3);
    assert_eq!(env.store.stored(), Some(Vec::new()));

    // 没有变化时不写入
    assert!(!env.manager.flush_if_dirty().unwrap());
    assert_eq!(env.store.write_count(), initial + 3);
}

/// 测试重启后恢复封禁与容量队列
#[test]
fn test_restart_restores_bans() {
    let env = create_env_with_store(Arc::new(MemoryBanStore::new()), 2, 0);
    env.manager
        .ban_addr(ip("10.3.0.1"), BanReason::NodeMisbehaving, 600, false);
    env.clock.set(1);
    env.manager
        .ban_addr(ip("10.3.0.2"), BanReason::NodeMisbehaving, 600, false);
    env.manager
        .ban_addr(ip("10.3.0.3"), BanReason::ManuallyAdded, 600, false);
    let store = env.store.clone();
    drop(env);

    let env = create_env_with_store(store, 2, 10);
    assert_eq!(env.manager.len(), 3);
    assert!(!env.manager.is_dirty());

    // 容量队列已恢复：新的自动封禁淘汰最早的那个
    let outcome = env
        .manager
        .ban_addr(ip("10.3.0.4"), BanReason::NodeMisbehaving, 600, false);
    assert_eq!(
        outcome,
        BanOutcome::Applied {
            evicted: Some(ip("10.3.0.1"))
        }
    );
}

/// 测试写入失败后保持脏状态
#[test]
fn test_failed_write_keeps_changes() {
    let env = create_env(0);
    env.store.set_fail_writes(true);

    env.manager
        .ban_addr(ip("192.0.2.20"), BanReason::ManuallyAdded, 60, false);
    assert!(env.manager.is_banned(&ip("192.0.2.20")));
    assert!(env.manager.is_dirty());

    env.store.set_fail_writes(false);
    env.manager.shutdown();
    assert!(!env.manager.is_dirty());
    assert_eq!(env.store.stored().unwrap().len(), 1);
}

impl crate::common::TestEnv {
    fn list_is_empty(&self) -> bool {
        self.manager.list_banned().is_empty()
    }
}
