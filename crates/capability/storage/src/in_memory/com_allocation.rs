//! COM 分配内存实现。

use crate::error::StorageError;
use crate::models::{ComAllocationRecord, ComAllocationUpdate};
use crate::traits::ComAllocationStore;
use chrono::Utc;
use std::sync::RwLock;

/// COM 分配内存存储
pub struct InMemoryComAllocationStore {
    allocations: RwLock<Vec<ComAllocationRecord>>,
}

impl InMemoryComAllocationStore {
    pub fn new() -> Self {
        Self {
            allocations: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryComAllocationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ComAllocationStore for InMemoryComAllocationStore {
    async fn list_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ComAllocationRecord>, StorageError> {
        let allocations = self
            .allocations
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(allocations
            .iter()
            .filter(|item| !item.is_deleted && item.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<ComAllocationRecord>, StorageError> {
        let allocations = self
            .allocations
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(allocations
            .iter()
            .filter(|item| !item.is_deleted)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ComAllocationRecord>, StorageError> {
        let allocations = self
            .allocations
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(allocations
            .iter()
            .find(|item| !item.is_deleted && item.id == id)
            .cloned())
    }

    async fn create_allocation(
        &self,
        record: ComAllocationRecord,
    ) -> Result<ComAllocationRecord, StorageError> {
        let mut allocations = self
            .allocations
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        allocations.push(record.clone());
        Ok(record)
    }

    async fn update_allocation(
        &self,
        id: &str,
        update: ComAllocationUpdate,
    ) -> Result<Option<ComAllocationRecord>, StorageError> {
        let mut allocations = self
            .allocations
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(item) = allocations
            .iter_mut()
            .find(|item| !item.is_deleted && item.id == id)
        else {
            return Ok(None);
        };
        if let Some(device_id) = update.device_id {
            item.device_id = device_id;
        }
        if let Some(com_ports) = update.com_ports {
            item.com_ports = com_ports;
        }
        item.update_time = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn delete_allocation(&self, id: &str) -> Result<bool, StorageError> {
        let mut allocations = self
            .allocations
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(item) = allocations
            .iter_mut()
            .find(|item| !item.is_deleted && item.id == id)
        else {
            return Ok(false);
        };
        item.is_deleted = true;
        item.update_time = Utc::now();
        Ok(true)
    }
}
