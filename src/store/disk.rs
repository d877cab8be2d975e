use crate::core::store::SharedStore;
use anyhow::{Context, Result};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use tracing::debug;

/// Persistent store backed by a fjall partition under the app data dir.
///
/// Concurrent CLI processes pointed at the same profile share cache and lock
/// entries through this partition. Internal storage errors degrade to a miss
/// or a dropped write; the caller never sees them.
pub struct DiskStore {
    _keyspace: Keyspace,
    partition: PartitionHandle,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create store directory: {}", path.display()))?;

        let keyspace = fjall::Config::new(path)
            .open()
            .with_context(|| format!("Failed to open store at {}", path.display()))?;
        let partition = keyspace
            .open_partition("shared", PartitionCreateOptions::default())
            .context("Failed to open shared store partition")?;

        Ok(Self {
            _keyspace: keyspace,
            partition,
        })
    }
}

impl SharedStore for DiskStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.partition.get(key) {
            Ok(Some(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(value) => {
                    debug!("Store HIT for key: {}", key);
                    Some(value)
                }
                Err(e) => {
                    // Unreadable entry is treated as a miss and discarded
                    debug!("Discarding non-utf8 store entry for {}: {}", key, e);
                    self.remove(key);
                    None
                }
            },
            Ok(None) => {
                debug!("Store MISS for key: {}", key);
                None
            }
            Err(e) => {
                debug!("DiskStore get error for {}: {}", key, e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(e) = self.partition.insert(key, value) {
            debug!("DiskStore set error for {}: {}", key, e);
        } else {
            debug!("Store SET for key: {}", key);
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.partition.remove(key) {
            debug!("DiskStore remove error for {}: {}", key, e);
        } else {
            debug!("Store REMOVE for key: {}", key);
        }
    }
}
