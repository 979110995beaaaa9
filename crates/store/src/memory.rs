use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::{CapabilityRecord, HandleStore};

/// In-process handle store. Used by tests and when the database cannot be opened.
#[derive(Debug, Default)]
pub struct MemoryHandleStore {
    records: Mutex<HashMap<String, CapabilityRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryHandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose writes always fail. Reads still work.
    pub fn failing() -> Self {
        Self {
            fail_writes: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("handle store is read-only"));
        }
        Ok(())
    }
}

impl HandleStore for MemoryHandleStore {
    fn put(&self, key: &str, record: &CapabilityRecord) -> Result<()> {
        self.check_writable()?;
        self.records.lock().insert(key.to_string(), record.clone());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<CapabilityRecord>> {
        Ok(self.records.lock().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.check_writable()?;
        self.records.lock().remove(key);
        Ok(())
    }

    fn protect(&self) -> Result<()> {
        self.check_writable()
    }
}
