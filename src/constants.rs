//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Centralized configuration constants for peerban.
//!
//! All magic numbers used by the ban manager are defined here with their
//! purpose and usage context.

/// Default ban duration (24 hours).
///
/// Substituted whenever a caller requests a ban with a non-positive offset.
pub const DEFAULT_BAN_TIME_SECS: i64 = 60 * 60 * 24;

/// Default interval between periodic sweep-and-flush passes (15 minutes).
pub const DEFAULT_FLUSH_INTERVAL_SECS: u64 = 60 * 15;

/// Default capacity of the misbehavior ring.
///
/// `0` disables eviction tracking, i.e. automatic bans are unbounded.
pub const DEFAULT_MISBEHAVING_CAPACITY: usize = 0;

/// Default file name used for the persisted ban list.
pub const DEFAULT_BANLIST_FILE_NAME: &str = "banlist.json";

/// Version tag written into the persisted ban list document.
///
/// Files carrying any other version are treated as corrupt and rewritten.
pub const BANLIST_FORMAT_VERSION: u32 = 1;

/// Message passed to observers before the initial load.
pub const LOADING_BANLIST_MESSAGE: &str = "Loading banlist...";

/// Maximum prefix length of an IPv4 subnet.
pub const MAX_IPV4_PREFIX: u8 = 32;

/// Maximum prefix length of an IPv6 subnet.
pub const MAX_IPV6_PREFIX: u8 = 128;
