use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::{DirEntryInfo, DirectoryAccess};

#[derive(Debug, Clone)]
struct MemFile {
    bytes: Vec<u8>,
    modified: DateTime<Utc>,
}

/// In-memory directory with injectable failures.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    name: String,
    files: Mutex<BTreeMap<String, MemFile>>,
    unreadable: Mutex<HashSet<String>>,
    revoked: AtomicBool,
    enumerate_delay: Mutex<Option<Duration>>,
    enumerations: AtomicUsize,
}

impl MemoryDirectory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Add a file modified at `modified_secs` (unix seconds).
    pub fn with_file(self, name: &str, content: impl AsRef<[u8]>, modified_secs: i64) -> Self {
        self.insert(name, content, modified_secs);
        self
    }

    pub fn insert(&self, name: &str, content: impl AsRef<[u8]>, modified_secs: i64) {
        let modified = Utc
            .timestamp_opt(modified_secs, 0)
            .single()
            .unwrap_or_default();
        self.files.lock().insert(
            name.to_string(),
            MemFile {
                bytes: content.as_ref().to_vec(),
                modified,
            },
        );
    }

    pub fn remove(&self, name: &str) {
        self.files.lock().remove(name);
    }

    /// Reads of `name` fail with `PermissionDenied`; it still shows up in listings.
    pub fn make_unreadable(&self, name: &str) {
        self.unreadable.lock().insert(name.to_string());
    }

    /// Every operation fails from now on, as if access had been withdrawn.
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    pub fn restore_access(&self) {
        self.revoked.store(false, Ordering::SeqCst);
    }

    /// Makes `enumerate` sleep before answering, to hold a scan open.
    pub fn set_enumerate_delay(&self, delay: Option<Duration>) {
        *self.enumerate_delay.lock() = delay;
    }

    /// Number of `enumerate` calls so far, probes included.
    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::SeqCst)
    }

    fn check_access(&self) -> io::Result<()> {
        if self.revoked.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("access to {} was revoked", self.name),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryAccess for MemoryDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn token(&self) -> String {
        format!("memory:{}", self.name)
    }

    async fn enumerate(&self) -> io::Result<Vec<DirEntryInfo>> {
        self.enumerations.fetch_add(1, Ordering::SeqCst);
        let delay = *self.enumerate_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_access()?;
        Ok(self
            .files
            .lock()
            .iter()
            .map(|(name, file)| DirEntryInfo {
                name: name.clone(),
                size: file.bytes.len() as u64,
                modified: file.modified,
                is_file: true,
            })
            .collect())
    }

    async fn open_entry(&self, name: &str) -> io::Result<Vec<u8>> {
        self.check_access()?;
        if self.unreadable.lock().contains(name) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{name} is not readable"),
            ));
        }
        self.files
            .lock()
            .get(name)
            .map(|f| f.bytes.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))
    }
}
