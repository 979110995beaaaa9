use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use scanner::{scan, DirectoryAccess, ScannedFile};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use store::{HandleStore, KeyValueStore, LAST_DIRECTORY_NAME_KEY};

use crate::display::FileRow;
use crate::handles::Handles;
use crate::platform::DirectoryPlatform;
use crate::TrackerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Uninitialized,
    Restoring,
    /// No usable directory. A last-known name may still be shown.
    Idle,
    Active,
    Scanning,
}

struct Inner {
    state: TrackerState,
    directory: Option<Arc<dyn DirectoryAccess>>,
    last_known_name: Option<String>,
    files: Vec<ScannedFile>,
    last_error: Option<String>,
    last_scan: Option<DateTime<Utc>>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            state: TrackerState::Uninitialized,
            directory: None,
            last_known_name: None,
            files: Vec::new(),
            last_error: None,
            last_scan: None,
        }
    }
}

/// Held for the duration of one scan. Dropping it, including when the scan
/// future is dropped part-way, clears the in-flight flag and leaves
/// `Scanning` for `Active`.
struct ScanGuard<'a> {
    flag: &'a AtomicBool,
    inner: &'a Mutex<Inner>,
}

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool, inner: &'a Mutex<Inner>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ScanGuard { flag, inner })
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        {
            let mut inner = self.inner.lock();
            if inner.state == TrackerState::Scanning {
                inner.state = match inner.directory {
                    Some(_) => TrackerState::Active,
                    None => TrackerState::Idle,
                };
            }
        }
        self.flag.store(false, Ordering::Release);
    }
}

/// Tracks encoder output in one user-granted directory.
pub struct ProgressTracker {
    platform: Arc<dyn DirectoryPlatform>,
    handles: Handles,
    names: Arc<dyn KeyValueStore>,
    inner: Mutex<Inner>,
    scanning: AtomicBool,
}

impl ProgressTracker {
    pub fn new(
        platform: Arc<dyn DirectoryPlatform>,
        store: Arc<dyn HandleStore>,
        names: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            handles: Handles::new(store, platform.clone()),
            platform,
            names,
            inner: Mutex::new(Inner::default()),
            scanning: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> TrackerState {
        self.inner.lock().state
    }

    pub fn files(&self) -> Vec<ScannedFile> {
        self.inner.lock().files.clone()
    }

    pub fn rows(&self) -> Vec<FileRow> {
        self.inner.lock().files.iter().map(FileRow::from_scanned).collect()
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    pub fn last_scan(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_scan
    }

    /// Name of the active directory, or the last-known one while idle.
    pub fn directory_name(&self) -> Option<String> {
        let inner = self.inner.lock();
        match &inner.directory {
            Some(dir) => Some(dir.name().to_string()),
            None => inner.last_known_name.clone(),
        }
    }

    fn set_state(&self, state: TrackerState) {
        self.inner.lock().state = state;
    }

    /// Session start: reopen and verify the stored directory.
    ///
    /// A directory that no longer verifies is forgotten; the tracker goes idle
    /// and keeps only its name for display.
    pub async fn restore(&self) -> TrackerState {
        self.set_state(TrackerState::Restoring);
        let last_known_name = self.names.get(LAST_DIRECTORY_NAME_KEY);

        let Some(record) = self.handles.load_record() else {
            let mut inner = self.inner.lock();
            inner.last_known_name = last_known_name;
            inner.state = TrackerState::Idle;
            return inner.state;
        };

        let live = match self.handles.open(&record).await {
            Some(dir) => Handles::verify(dir.as_ref()).await.then_some(dir),
            None => None,
        };

        let Some(dir) = live else {
            self.handles.clear();
            let mut inner = self.inner.lock();
            inner.last_known_name = last_known_name.or(Some(record.name));
            inner.directory = None;
            inner.files.clear();
            inner.state = TrackerState::Idle;
            return inner.state;
        };

        tracing::info!("restored access to {}", dir.name());
        self.activate(dir.clone());
        if let Err(e) = self.run_scan(dir).await {
            tracing::warn!("initial scan failed: {}", e);
        }
        self.state()
    }

    /// Ask the platform for a directory. `Ok(false)` when the user cancels.
    pub async fn grant_access(&self) -> Result<bool, TrackerError> {
        if !self.platform.is_supported() {
            return Err(TrackerError::Unsupported);
        }
        let Some(dir) = self.platform.pick_directory().await? else {
            tracing::debug!("directory selection cancelled");
            return Ok(false);
        };

        self.handles.save(dir.as_ref());
        if let Err(e) = self.names.set(LAST_DIRECTORY_NAME_KEY, dir.name()) {
            tracing::warn!("could not remember directory name: {:#}", e);
        }
        tracing::info!("granted access to {}", dir.name());
        self.activate(dir.clone());
        if let Err(e) = self.run_scan(dir).await {
            tracing::warn!("initial scan failed: {}", e);
        }
        Ok(true)
    }

    /// Rescan the active directory. Returns the number of media files found.
    pub async fn refresh(&self) -> Result<usize, TrackerError> {
        let dir = {
            let inner = self.inner.lock();
            match (inner.state, &inner.directory) {
                (TrackerState::Scanning, _) => return Err(TrackerError::ScanInProgress),
                (TrackerState::Active, Some(dir)) => dir.clone(),
                _ => return Err(TrackerError::NotActive),
            }
        };
        self.run_scan(dir).await
    }

    /// Drop the stored directory and everything derived from it.
    pub fn forget(&self) {
        self.handles.clear();
        if let Err(e) = self.names.remove(LAST_DIRECTORY_NAME_KEY) {
            tracing::warn!("could not clear directory name: {:#}", e);
        }
        *self.inner.lock() = Inner::default();
    }

    fn activate(&self, dir: Arc<dyn DirectoryAccess>) {
        let mut inner = self.inner.lock();
        inner.last_known_name = Some(dir.name().to_string());
        inner.directory = Some(dir);
        inner.files.clear();
        inner.last_error = None;
        inner.last_scan = None;
        inner.state = TrackerState::Active;
    }

    async fn run_scan(&self, dir: Arc<dyn DirectoryAccess>) -> Result<usize, TrackerError> {
        let Some(_guard) = ScanGuard::acquire(&self.scanning, &self.inner) else {
            return Err(TrackerError::ScanInProgress);
        };
        self.set_state(TrackerState::Scanning);

        let result = scan(dir.as_ref()).await;

        let mut inner = self.inner.lock();
        let current = inner
            .directory
            .as_ref()
            .is_some_and(|d| Arc::ptr_eq(d, &dir));
        if !current {
            // Forgotten or replaced while scanning; results belong to nobody.
            return Ok(0);
        }
        inner.state = TrackerState::Active;
        match result {
            Ok(files) => {
                let count = files.len();
                inner.files = files;
                inner.last_error = None;
                inner.last_scan = Some(Utc::now());
                Ok(count)
            }
            Err(e) => {
                inner.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }
}
