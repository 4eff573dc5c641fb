//! 挂断记录内存实现。

use crate::error::StorageError;
use crate::models::CallHangupRecord;
use crate::scope::{AccessScope, CallHangupQuery, Page, PageRequest, normalize};
use crate::traits::CallHangupStore;
use std::sync::RwLock;

/// 挂断记录内存存储
pub struct InMemoryCallHangupStore {
    records: RwLock<Vec<CallHangupRecord>>,
}

impl InMemoryCallHangupStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryCallHangupStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_query(record: &CallHangupRecord, query: &CallHangupQuery) -> bool {
    if let Some(device_id) = &query.device_id {
        if normalize(&record.device_id) != normalize(device_id) {
            return false;
        }
    }
    if let Some(com_port) = &query.com_port {
        if normalize(&record.com_port) != normalize(com_port) {
            return false;
        }
    }
    if let Some(caller) = &query.caller_contains {
        match &record.caller_number {
            Some(number) => {
                if !number.contains(caller.trim()) {
                    return false;
                }
            }
            None => return false,
        }
    }
    if let Some(start) = query.start_time {
        if record.hangup_time < start {
            return false;
        }
    }
    if let Some(end) = query.end_time {
        if record.hangup_time > end {
            return false;
        }
    }
    true
}

#[async_trait::async_trait]
impl CallHangupStore for InMemoryCallHangupStore {
    async fn insert_record(
        &self,
        record: CallHangupRecord,
    ) -> Result<CallHangupRecord, StorageError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        records.push(record.clone());
        Ok(record)
    }

    async fn query_records(
        &self,
        scope: &AccessScope,
        query: &CallHangupQuery,
        page: PageRequest,
    ) -> Result<Page<CallHangupRecord>, StorageError> {
        if scope.is_empty() {
            return Ok(Page::empty(page));
        }
        let records = self
            .records
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<CallHangupRecord> = records
            .iter()
            .filter(|item| !item.is_deleted || scope.include_deleted())
            .filter(|item| scope.allows(&item.device_id, &item.com_port))
            .filter(|item| matches_query(item, query))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.hangup_time.cmp(&a.hangup_time));
        let total_count = items.len() as i64;
        let data: Vec<CallHangupRecord> = items
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .collect();
        Ok(Page {
            total_count,
            page_number: page.page_number,
            page_size: page.page_size,
            data,
        })
    }

    async fn visible_record_ids(
        &self,
        scope: &AccessScope,
        device_id: Option<&str>,
        com_port: Option<&str>,
    ) -> Result<Vec<String>, StorageError> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }
        let records = self
            .records
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(records
            .iter()
            .filter(|item| !item.is_deleted)
            .filter(|item| scope.allows(&item.device_id, &item.com_port))
            .filter(|item| match device_id {
                Some(device_id) => normalize(&item.device_id) == normalize(device_id),
                None => true,
            })
            .filter(|item| match com_port {
                Some(com_port) => normalize(&item.com_port) == normalize(com_port),
                None => true,
            })
            .map(|item| item.id.clone())
            .collect())
    }

    async fn soft_delete_record(&self, id: &str) -> Result<bool, StorageError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(item) = records.iter_mut().find(|item| !item.is_deleted && item.id == id)
        else {
            return Ok(false);
        };
        item.is_deleted = true;
        Ok(true)
    }

    async fn hard_delete_record(&self, id: &str) -> Result<bool, StorageError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let before = records.len();
        records.retain(|item| item.id != id);
        Ok(records.len() < before)
    }
}
