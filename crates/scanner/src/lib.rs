/// Directory capabilities and the sidecar scanner
///
/// A capability is any `DirectoryAccess` implementation: the scanner never sees
/// paths, only entry names handed out by the capability itself.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

mod classify;
mod fs;
mod memory;
mod scan;

pub use classify::{classify, mime_type_for, EntryKind, MEDIA_EXTENSIONS};
pub use fs::FsDirectory;
pub use memory::MemoryDirectory;
pub use scan::{scan, MediaFileEntry, ScannedFile};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("cannot enumerate {dir}: {source}")]
    Enumerate {
        dir: String,
        #[source]
        source: io::Error,
    },
}

/// Metadata for one directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntryInfo {
    pub name: String,
    pub size: u64,
    pub modified: chrono::DateTime<chrono::Utc>,
    pub is_file: bool,
}

/// Read access to one directory.
#[async_trait]
pub trait DirectoryAccess: Send + Sync + std::fmt::Debug {
    /// Human-readable directory name.
    fn name(&self) -> &str;

    /// Opaque token the issuing platform can use to reopen this capability.
    fn token(&self) -> String;

    async fn enumerate(&self) -> io::Result<Vec<DirEntryInfo>>;

    async fn open_entry(&self, name: &str) -> io::Result<Vec<u8>>;

    /// Cheapest operation that proves access is still live.
    async fn probe(&self) -> io::Result<()> {
        self.enumerate().await.map(|_| ())
    }
}
