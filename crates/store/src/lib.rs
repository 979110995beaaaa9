use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod kv;
mod memory;
mod sqlite;

pub use kv::{JsonKvStore, KeyValueStore, MemoryKvStore};
pub use memory::MemoryHandleStore;
pub use sqlite::SqliteHandleStore;

/// Fixed key the directory capability is stored under.
pub const DIRECTORY_KEY: &str = "directory";

/// Display-only name of the last granted directory.
pub const LAST_DIRECTORY_NAME_KEY: &str = "last_directory_name";

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| std::env::temp_dir());
    base.join("encwatch")
}

/// Persisted form of a directory capability.
///
/// The token is opaque to the store; only the platform that issued it can turn
/// it back into live access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRecord {
    pub platform: String,
    pub token: String,
    pub name: String,
    pub granted_at: chrono::DateTime<chrono::Utc>,
}

impl CapabilityRecord {
    pub fn new(platform: impl Into<String>, token: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            token: token.into(),
            name: name.into(),
            granted_at: chrono::Utc::now(),
        }
    }
}

/// Durable storage for capability records.
pub trait HandleStore: Send + Sync {
    fn put(&self, key: &str, record: &CapabilityRecord) -> Result<()>;

    /// `Ok(None)` when nothing is stored or the schema does not exist yet.
    fn get(&self, key: &str) -> Result<Option<CapabilityRecord>>;

    /// Removing a missing key is not an error.
    fn delete(&self, key: &str) -> Result<()>;

    /// Ask the backend to keep stored records safe from eviction or loss.
    fn protect(&self) -> Result<()> {
        Ok(())
    }
}
