//! 发送记录内存实现。

use crate::error::StorageError;
use crate::models::SmsSendRecord;
use crate::traits::SendRecordStore;
use chrono::Utc;
use std::sync::RwLock;

/// 发送记录内存存储
pub struct InMemorySendRecordStore {
    records: RwLock<Vec<SmsSendRecord>>,
}

impl InMemorySendRecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemorySendRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SendRecordStore for InMemorySendRecordStore {
    async fn create_record(&self, record: SmsSendRecord) -> Result<SmsSendRecord, StorageError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        records.push(record.clone());
        Ok(record)
    }

    async fn find_record(&self, id: &str) -> Result<Option<SmsSendRecord>, StorageError> {
        let records = self
            .records
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(records.iter().find(|item| item.id == id).cloned())
    }

    async fn update_status(
        &self,
        id: &str,
        status: &str,
        error_message: Option<&str>,
    ) -> Result<Option<SmsSendRecord>, StorageError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(item) = records.iter_mut().find(|item| item.id == id) else {
            return Ok(None);
        };
        item.status = status.to_string();
        item.error_message = error_message.map(|message| message.to_string());
        item.update_time = Utc::now();
        Ok(Some(item.clone()))
    }
}
