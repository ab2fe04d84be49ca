//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Peerban - Peer Ban Management
//!
//! Tracks banned peer addresses and subnets for a networked node, decides
//! whether an incoming peer may connect, and persists the ban list.
//!
//! # API Layers
//!
//! ## Prelude (Quick Start)
//!
//! Use `use peerban::prelude::*;` to import all commonly used types.
//!
//! ## Core API
//!
//! - [`BanManager`] - Thread-safe façade: ban, unban, query, persist
//! - [`BanManagerConfig`] - Configuration (YAML / TOML / JSON)
//! - [`BanKey`] / [`Subnet`] - What is banned
//! - [`BanEntry`] / [`BanReason`] / [`BanLevel`] - How and why it is banned
//! - [`BanManError`] - Error types
//!
//! ## Building blocks
//!
//! - [`table::BanTable`] - Ban map with precedence rules
//! - [`ring::MisbehaviorRing`] - Bounded FIFO of automatic bans
//! - [`gate::PersistenceGate`] - Dirty flag with flush tickets
//! - [`storage`] - Store trait, in-memory and JSON file stores
//!
//! # Examples
//!
//! ```rust
//! use peerban::prelude::*;
//! use std::sync::Arc;
//!
//! let manager = BanManager::builder()
//!     .store(Arc::new(MemoryBanStore::new()))
//!     .build()
//!     .unwrap();
//!
//! let addr = "203.0.113.7".parse().unwrap();
//! manager.ban_addr(addr, BanReason::NodeMisbehaving, 3600, false);
//! assert!(manager.is_banned(&addr));
//! assert_eq!(manager.ban_level(&addr), BanLevel::Misbehaving);
//! ```
//!
//! # Features
//!
//! - **Manual bans win**: automatic bans never override or shorten a manual ban
//! - **Bounded automatic bans**: oldest misbehaving ban is evicted when full
//! - **Lazy persistence**: writes only when the ban set changed
//! - **Background maintenance**: periodic sweep and flush (`runtime` feature)

pub mod prelude;

pub mod ban_manager;
pub mod clock;
pub mod config;
pub mod constants;
pub mod entry;
pub mod error;
pub mod gate;
pub mod net;
pub mod observer;
pub mod ring;
pub mod storage;
pub mod table;

pub use ban_manager::{BanManager, BanManagerBuilder};
pub use clock::{Clock, MockClock, SystemClock};
pub use config::BanManagerConfig;
pub use entry::{BanEntry, BanLevel, BanReason, ReasonCode};
pub use error::{BanManError, StoreError};
pub use gate::{FlushTicket, GateState, PersistenceGate};
pub use net::{BanKey, Subnet};
#[cfg(feature = "runtime")]
pub use observer::BroadcastObserver;
pub use observer::{BanEvent, BanObserver, FnObserver, NoopObserver};
pub use ring::MisbehaviorRing;
pub use storage::{BanStore, JsonFileBanStore, MemoryBanStore};
pub use table::{BanOutcome, BanTable};
