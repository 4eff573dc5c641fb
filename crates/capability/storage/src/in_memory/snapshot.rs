//! 设备快照内存实现。覆盖语义由 HashMap insert 天然保证。

use crate::error::StorageError;
use crate::models::DeviceComSnapshotRecord;
use crate::traits::SnapshotStore;
use std::collections::HashMap;
use std::sync::RwLock;

/// 设备快照内存存储
pub struct InMemorySnapshotStore {
    snapshots: RwLock<HashMap<String, DeviceComSnapshotRecord>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn upsert_snapshot(
        &self,
        record: DeviceComSnapshotRecord,
    ) -> Result<DeviceComSnapshotRecord, StorageError> {
        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        snapshots.insert(record.device_id.clone(), record.clone());
        Ok(record)
    }

    async fn find_snapshot(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceComSnapshotRecord>, StorageError> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(snapshots.get(device_id).cloned())
    }
}
