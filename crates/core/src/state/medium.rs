//! # Storage Medium
//!
//! Key/value byte store underneath the design history. Writes may be rejected
//! with [`MediumError::QuotaExceeded`], which callers can tell apart from any
//! other failure.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::MediumError;

/// Durable key/value storage with an optional capacity ceiling
pub trait StorageMedium: Send + Sync {
    /// Read the value stored under `key`
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, MediumError>;

    /// Replace the value stored under `key`
    fn write(&self, key: &str, value: &[u8]) -> Result<(), MediumError>;
}

/// Process-local medium, optionally bounded to a total byte quota across keys
#[derive(Debug, Default)]
pub struct MemoryMedium {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    quota: Option<u64>,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    /// Store raw bytes without quota checks (for seeding corrupt data)
    pub fn insert_raw(&self, key: &str, value: &[u8]) -> Result<(), MediumError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| MediumError::Lock(e.to_string()))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    /// Total bytes currently held across all keys
    pub fn used_bytes(&self) -> u64 {
        self.entries
            .lock()
            .map(|entries| entries.values().map(|v| v.len() as u64).sum())
            .unwrap_or(0)
    }
}

impl StorageMedium for MemoryMedium {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, MediumError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| MediumError::Lock(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &[u8]) -> Result<(), MediumError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| MediumError::Lock(e.to_string()))?;

        if let Some(quota) = self.quota {
            let others: u64 = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len() as u64)
                .sum();
            let requested = others + value.len() as u64;
            if requested > quota {
                return Err(MediumError::QuotaExceeded { requested, quota });
            }
        }

        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
