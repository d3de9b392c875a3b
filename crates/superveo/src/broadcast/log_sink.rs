//! Bounded activity log shown to the user.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::db::{DatabaseError, SnapshotStore, LOGS_KEY};

/// Maximum number of entries kept; older entries are evicted first.
pub const MAX_LOG_ENTRIES: usize = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Info,
    Success,
    Warning,
    Error,
}

impl LogType {
    fn level(&self) -> log::Level {
        match self {
            LogType::Info | LogType::Success => log::Level::Info,
            LogType::Warning => log::Level::Warn,
            LogType::Error => log::Level::Error,
        }
    }
}

/// An immutable activity record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEntry {
    pub id: String,
    /// Local wall-clock time, 24h `HH:MM:SS`.
    pub timestamp: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: LogType,
}

static ENTRY_SEQ: AtomicU64 = AtomicU64::new(0);

impl LogEntry {
    pub fn new(message: &str, kind: LogType) -> Self {
        let seq = ENTRY_SEQ.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{}-{}", Utc::now().timestamp_millis(), seq),
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            message: message.to_string(),
            kind,
        }
    }
}

/// Append-only log capped at [`MAX_LOG_ENTRIES`], newest first.
///
/// Purely observational: nothing reads entries back to make decisions.
pub struct LogSink {
    store: Arc<dyn SnapshotStore>,
    entries: Mutex<VecDeque<LogEntry>>,
    sender: broadcast::Sender<LogEntry>,
}

impl LogSink {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        let (sender, _) = broadcast::channel(MAX_LOG_ENTRIES);
        Self {
            store,
            entries: Mutex::new(VecDeque::with_capacity(MAX_LOG_ENTRIES + 1)),
            sender,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Log sink lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Replaces the in-memory entries with the persisted snapshot.
    pub fn load(&self) -> Result<usize, DatabaseError> {
        let mut loaded: VecDeque<LogEntry> = match self.store.load(LOGS_KEY)? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Discarding unreadable log snapshot: {}", e);
                    VecDeque::new()
                }
            },
            None => VecDeque::new(),
        };
        loaded.truncate(MAX_LOG_ENTRIES);

        let count = loaded.len();
        *self.lock() = loaded;
        Ok(count)
    }

    /// Serializes the current entries.
    pub fn snapshot(&self) -> Result<String, DatabaseError> {
        serde_json::to_string(&*self.lock()).map_err(|source| DatabaseError::Serialization {
            key: LOGS_KEY.to_string(),
            source,
        })
    }

    pub fn persist(&self) -> Result<(), DatabaseError> {
        let raw = self.snapshot()?;
        self.store.save(LOGS_KEY, &raw)
    }

    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            log::error!("Failed to persist activity log: {}", e);
        }
    }

    /// Records an entry, evicting the oldest beyond the cap.
    pub fn append(&self, message: &str, kind: LogType) {
        log::log!(target: "superveo::activity", kind.level(), "{}", message);

        let entry = LogEntry::new(message, kind);
        {
            let mut entries = self.lock();
            entries.push_front(entry.clone());
            entries.truncate(MAX_LOG_ENTRIES);
        }
        self.persist_logged();
        let _ = self.sender.send(entry);
    }

    pub fn info(&self, message: &str) {
        self.append(message, LogType::Info);
    }

    pub fn success(&self, message: &str) {
        self.append(message, LogType::Success);
    }

    pub fn warning(&self, message: &str) {
        self.append(message, LogType::Warning);
    }

    pub fn error(&self, message: &str) {
        self.append(message, LogType::Error);
    }

    pub fn clear(&self) {
        self.lock().clear();
        self.persist_logged();
    }

    /// Returns entries newest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemorySnapshotStore;

    fn sink() -> (Arc<MemorySnapshotStore>, LogSink) {
        let store = Arc::new(MemorySnapshotStore::new());
        let sink = LogSink::new(store.clone());
        (store, sink)
    }

    #[test]
    fn test_append_prepends() {
        let (_, sink) = sink();
        sink.info("first");
        sink.success("second");

        let entries = sink.entries();
        assert_eq!(entries[0].message, "second");
        assert_eq!(entries[0].kind, LogType::Success);
        assert_eq!(entries[1].message, "first");
    }

    #[test]
    fn test_cap_evicts_oldest_first() {
        let (_, sink) = sink();
        for i in 0..250 {
            sink.info(&format!("entry {}", i));
            assert!(sink.len() <= MAX_LOG_ENTRIES);
        }

        let entries = sink.entries();
        assert_eq!(entries.len(), MAX_LOG_ENTRIES);
        assert_eq!(entries[0].message, "entry 249");
        assert_eq!(entries[MAX_LOG_ENTRIES - 1].message, "entry 150");
    }

    #[test]
    fn test_timestamp_format() {
        let entry = LogEntry::new("hello", LogType::Info);
        assert_eq!(entry.timestamp.len(), 8);
        assert_eq!(entry.timestamp.matches(':').count(), 2);
    }

    #[test]
    fn test_entry_ids_unique() {
        let a = LogEntry::new("a", LogType::Info);
        let b = LogEntry::new("b", LogType::Info);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_type_field_name_on_wire() {
        let entry = LogEntry::new("careful", LogType::Warning);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "warning");
    }

    #[test]
    fn test_persist_and_reload_identical() {
        let (store, sink) = sink();
        sink.info("one");
        sink.error("two");
        let first = sink.snapshot().unwrap();

        let reloaded = LogSink::new(store);
        assert_eq!(reloaded.load().unwrap(), 2);
        assert_eq!(reloaded.snapshot().unwrap(), first);
    }

    #[test]
    fn test_clear_persists_empty() {
        let (store, sink) = sink();
        sink.info("one");
        sink.clear();
        assert!(sink.is_empty());
        assert_eq!(store.load(LOGS_KEY).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_subscribe_receives_entries() {
        let (_, sink) = sink();
        let mut rx = sink.subscribe();
        sink.warning("heads up");
        assert_eq!(rx.try_recv().unwrap().message, "heads up");
    }
}
