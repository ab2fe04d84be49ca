//! Prelude module - Commonly used types for quick imports
//!
//! This module re-exports the most commonly used types from Peerban,
//! allowing users to import them with a single `use peerban::prelude::*;`
//! statement instead of importing each type individually.

// Core types
pub use crate::ban_manager::{BanManager, BanManagerBuilder};
pub use crate::config::BanManagerConfig;
pub use crate::error::{BanManError, StoreError};

// Ban data
pub use crate::entry::{BanEntry, BanLevel, BanReason, ReasonCode};
pub use crate::net::{BanKey, Subnet};
pub use crate::table::BanOutcome;

// Pluggable collaborators
pub use crate::clock::{Clock, SystemClock};
pub use crate::observer::{BanObserver, NoopObserver};
pub use crate::storage::{BanStore, JsonFileBanStore, MemoryBanStore};

#[cfg(feature = "runtime")]
pub use crate::observer::BroadcastObserver;
