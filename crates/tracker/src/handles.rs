use scanner::DirectoryAccess;
use std::sync::Arc;
use store::{CapabilityRecord, HandleStore, DIRECTORY_KEY};

use crate::platform::DirectoryPlatform;

/// Persistence of the one granted directory. Nothing here fails the caller:
/// storage problems are logged and read as "nothing stored".
pub struct Handles {
    store: Arc<dyn HandleStore>,
    platform: Arc<dyn DirectoryPlatform>,
}

impl Handles {
    pub fn new(store: Arc<dyn HandleStore>, platform: Arc<dyn DirectoryPlatform>) -> Self {
        Self { store, platform }
    }

    pub fn save(&self, dir: &dyn DirectoryAccess) {
        let record = CapabilityRecord::new(self.platform.id(), dir.token(), dir.name());
        if let Err(e) = self.store.put(DIRECTORY_KEY, &record) {
            tracing::warn!("could not persist access to {}: {:#}", dir.name(), e);
            return;
        }
        if let Err(e) = self.store.protect() {
            tracing::debug!("storage protection request failed: {:#}", e);
        }
    }

    pub fn load_record(&self) -> Option<CapabilityRecord> {
        match self.store.get(DIRECTORY_KEY) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("could not read stored directory: {:#}", e);
                None
            }
        }
    }

    /// Reopen a stored record through the platform.
    pub async fn open(&self, record: &CapabilityRecord) -> Option<Arc<dyn DirectoryAccess>> {
        if record.platform != self.platform.id() {
            tracing::warn!(
                "stored directory {} belongs to platform {:?}",
                record.name,
                record.platform
            );
            return None;
        }
        match self.platform.reopen(&record.token).await {
            Ok(dir) => Some(dir),
            Err(e) => {
                tracing::info!("stored directory {} is gone: {}", record.name, e);
                None
            }
        }
    }

    pub async fn load(&self) -> Option<Arc<dyn DirectoryAccess>> {
        let record = self.load_record()?;
        self.open(&record).await
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.delete(DIRECTORY_KEY) {
            tracing::warn!("could not clear stored directory: {:#}", e);
        }
    }

    pub async fn verify(dir: &dyn DirectoryAccess) -> bool {
        match dir.probe().await {
            Ok(()) => true,
            Err(e) => {
                tracing::info!("access to {} is no longer valid: {}", dir.name(), e);
                false
            }
        }
    }
}
