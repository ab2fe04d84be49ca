//! 存储抽象层
//!
//! 定义封禁列表的持久化接口和基本实现：内存存储与JSON文件存储。

use crate::constants::BANLIST_FORMAT_VERSION;
use crate::entry::{BanEntry, BanReason};
use crate::error::StoreError;
use crate::net::BanKey;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

/// 封禁列表存储接口
///
/// 只要求键与记录的往返一致，具体格式由实现决定。
pub trait BanStore: Send + Sync {
    /// 读取完整快照
    fn read(&self) -> Result<Vec<(BanKey, BanEntry)>, StoreError>;

    /// 写入完整快照（覆盖已有内容）
    fn write(&self, entries: &[(BanKey, BanEntry)]) -> Result<(), StoreError>;
}

/// 持久化的单条封禁
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanRecord {
    pub key: BanKey,
    pub created_at: i64,
    pub banned_until: i64,
    pub reason: BanReason,
}

impl From<&(BanKey, BanEntry)> for BanRecord {
    fn from((key, entry): &(BanKey, BanEntry)) -> Self {
        Self {
            key: *key,
            created_at: entry.created_at,
            banned_until: entry.banned_until,
            reason: entry.reason,
        }
    }
}

impl From<BanRecord> for (BanKey, BanEntry) {
    fn from(record: BanRecord) -> Self {
        (
            record.key,
            BanEntry::new(record.created_at, record.banned_until, record.reason),
        )
    }
}

/// 封禁列表文件内容
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanListDocument {
    pub version: u32,
    pub bans: Vec<BanRecord>,
}

impl BanListDocument {
    pub fn new(entries: &[(BanKey, BanEntry)]) -> Self {
        Self {
            version: BANLIST_FORMAT_VERSION,
            bans: entries.iter().map(BanRecord::from).collect(),
        }
    }

    pub fn into_entries(self) -> Result<Vec<(BanKey, BanEntry)>, StoreError> {
        if self.version != BANLIST_FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "不支持的版本: {}",
                self.version
            )));
        }
        Ok(self.bans.into_iter().map(Into::into).collect())
    }
}

/// 内存存储实现
///
/// 从未写入时读取返回 [`StoreError::NotFound`]。
#[derive(Debug, Default)]
pub struct MemoryBanStore {
    entries: Mutex<Option<Vec<(BanKey, BanEntry)>>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBanStore {
    /// 创建新的内存存储
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建带有初始快照的内存存储
    pub fn with_entries(entries: Vec<(BanKey, BanEntry)>) -> Self {
        Self {
            entries: Mutex::new(Some(entries)),
            ..Self::default()
        }
    }

    /// 让后续写入失败（用于模拟磁盘故障）
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 成功写入的次数
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// 最近一次写入的快照
    pub fn stored(&self) -> Option<Vec<(BanKey, BanEntry)>> {
        self.entries.lock().clone()
    }
}

impl BanStore for MemoryBanStore {
    fn read(&self) -> Result<Vec<(BanKey, BanEntry)>, StoreError> {
        self.entries
            .lock()
            .clone()
            .ok_or_else(|| StoreError::NotFound("内存存储为空".to_string()))
    }

    fn write(&self, entries: &[(BanKey, BanEntry)]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io("模拟写入失败".to_string()));
        }
        *self.entries.lock() = Some(entries.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// JSON文件存储
///
/// 先写入临时文件再重命名，保证文件内容要么是旧快照要么是新快照。
#[derive(Debug, Clone)]
pub struct JsonFileBanStore {
    path: PathBuf,
}

impl JsonFileBanStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl BanStore for JsonFileBanStore {
    fn read(&self) -> Result<Vec<(BanKey, BanEntry)>, StoreError> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let document: BanListDocument = serde_json::from_reader(reader)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let entries = document.into_entries()?;

        debug!(
            "Read {} ban entries from {}",
            entries.len(),
            self.path.display()
        );
        Ok(entries)
    }

    fn write(&self, entries: &[(BanKey, BanEntry)]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &BanListDocument::new(entries))
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        debug!(
            "Wrote {} ban entries to {}",
            entries.len(),
            self.path.display()
        );
        Ok(())
    }
}
