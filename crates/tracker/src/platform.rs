//! Host facilities for granting and reopening directory capabilities.

use async_trait::async_trait;
use parking_lot::Mutex;
use scanner::{DirectoryAccess, FsDirectory, MemoryDirectory};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("directory access is not supported on this platform")]
    Unsupported,
    #[error("capability was issued by {found:?}, expected {expected:?}")]
    ForeignRecord { expected: String, found: String },
    #[error("unknown directory {0}")]
    NotFound(String),
    #[error("directory access failed: {0}")]
    Io(#[from] io::Error),
}

#[async_trait]
pub trait DirectoryPlatform: Send + Sync {
    /// Tag written into persisted records.
    fn id(&self) -> &'static str;

    /// Whether `pick_directory` can run at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Run the selection flow. `Ok(None)` means the user cancelled.
    async fn pick_directory(&self) -> Result<Option<Arc<dyn DirectoryAccess>>, AccessError>;

    /// Turn a token from `DirectoryAccess::token` back into live access.
    async fn reopen(&self, token: &str) -> Result<Arc<dyn DirectoryAccess>, AccessError>;
}

/// Local filesystem. The grant flow is a path chosen up front (a CLI argument).
#[derive(Debug, Clone, Default)]
pub struct PathPlatform {
    chosen: Option<PathBuf>,
}

impl PathPlatform {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            chosen: Some(path.into()),
        }
    }

    /// Can reopen stored capabilities but has no way to grant new ones.
    pub fn restore_only() -> Self {
        Self { chosen: None }
    }
}

#[async_trait]
impl DirectoryPlatform for PathPlatform {
    fn id(&self) -> &'static str {
        "fs"
    }

    fn is_supported(&self) -> bool {
        self.chosen.is_some()
    }

    async fn pick_directory(&self) -> Result<Option<Arc<dyn DirectoryAccess>>, AccessError> {
        let Some(path) = self.chosen.as_ref() else {
            return Err(AccessError::Unsupported);
        };
        let dir = FsDirectory::open(path).await?;
        Ok(Some(Arc::new(dir)))
    }

    async fn reopen(&self, token: &str) -> Result<Arc<dyn DirectoryAccess>, AccessError> {
        Ok(Arc::new(FsDirectory::open(token).await?))
    }
}

/// Native folder picker.
#[cfg(feature = "dialog")]
#[derive(Debug, Clone, Default)]
pub struct DialogPlatform;

#[cfg(feature = "dialog")]
#[async_trait]
impl DirectoryPlatform for DialogPlatform {
    fn id(&self) -> &'static str {
        "fs"
    }

    async fn pick_directory(&self) -> Result<Option<Arc<dyn DirectoryAccess>>, AccessError> {
        let picked = rfd::AsyncFileDialog::new()
            .set_title("Select the encoder output folder")
            .pick_folder()
            .await;
        match picked {
            Some(handle) => Ok(Some(Arc::new(FsDirectory::open(handle.path()).await?))),
            None => Ok(None),
        }
    }

    async fn reopen(&self, token: &str) -> Result<Arc<dyn DirectoryAccess>, AccessError> {
        Ok(Arc::new(FsDirectory::open(token).await?))
    }
}

/// Platform over in-memory directories, for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryPlatform {
    directories: Mutex<HashMap<String, Arc<MemoryDirectory>>>,
    next_pick: Mutex<Option<Arc<MemoryDirectory>>>,
    unsupported: bool,
}

impl MemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unsupported() -> Self {
        Self {
            unsupported: true,
            ..Self::default()
        }
    }

    /// Make `dir` reopenable by token.
    pub fn register(&self, dir: Arc<MemoryDirectory>) {
        self.directories.lock().insert(dir.token(), dir);
    }

    /// Forget `dir`, as if it had been deleted.
    pub fn unregister(&self, dir: &MemoryDirectory) {
        self.directories.lock().remove(&dir.token());
    }

    /// The next `pick_directory` returns `dir`; with nothing queued it reports
    /// a cancelled selection.
    pub fn queue_pick(&self, dir: Arc<MemoryDirectory>) {
        self.register(dir.clone());
        *self.next_pick.lock() = Some(dir);
    }
}

#[async_trait]
impl DirectoryPlatform for MemoryPlatform {
    fn id(&self) -> &'static str {
        "memory"
    }

    fn is_supported(&self) -> bool {
        !self.unsupported
    }

    async fn pick_directory(&self) -> Result<Option<Arc<dyn DirectoryAccess>>, AccessError> {
        let picked = self.next_pick.lock().take();
        Ok(picked.map(|d| d as Arc<dyn DirectoryAccess>))
    }

    async fn reopen(&self, token: &str) -> Result<Arc<dyn DirectoryAccess>, AccessError> {
        self.directories
            .lock()
            .get(token)
            .cloned()
            .map(|d| d as Arc<dyn DirectoryAccess>)
            .ok_or_else(|| AccessError::NotFound(token.to_string()))
    }
}
