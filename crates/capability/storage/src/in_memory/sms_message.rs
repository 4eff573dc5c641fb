//! 短信内存实现。
//!
//! 可见性、过滤、排序与分页的语义以这里为准，Postgres 实现与之对齐。

use crate::error::StorageError;
use crate::models::SmsMessageRecord;
use crate::scope::{AccessScope, Page, PageRequest, SmsMessageQuery, normalize};
use crate::traits::SmsMessageStore;
use std::sync::RwLock;

/// 短信内存存储
pub struct InMemorySmsMessageStore {
    messages: RwLock<Vec<SmsMessageRecord>>,
}

impl InMemorySmsMessageStore {
    pub fn new() -> Self {
        Self {
            messages: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemorySmsMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_query(record: &SmsMessageRecord, query: &SmsMessageQuery) -> bool {
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
    if let Some(sender) = &query.sender_contains {
        if !record.sender_number.contains(sender.trim()) {
            return false;
        }
    }
    if let Some(start) = query.start_time {
        if record.received_time < start {
            return false;
        }
    }
    if let Some(end) = query.end_time {
        if record.received_time > end {
            return false;
        }
    }
    true
}

#[async_trait::async_trait]
impl SmsMessageStore for InMemorySmsMessageStore {
    async fn insert_message(
        &self,
        record: SmsMessageRecord,
    ) -> Result<SmsMessageRecord, StorageError> {
        let mut messages = self
            .messages
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        messages.push(record.clone());
        Ok(record)
    }

    async fn query_messages(
        &self,
        scope: &AccessScope,
        query: &SmsMessageQuery,
        page: PageRequest,
    ) -> Result<Page<SmsMessageRecord>, StorageError> {
        if scope.is_empty() {
            return Ok(Page::empty(page));
        }
        let messages = self
            .messages
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<SmsMessageRecord> = messages
            .iter()
            .filter(|item| !item.is_deleted || scope.include_deleted())
            .filter(|item| scope.allows(&item.device_id, &item.com_port))
            .filter(|item| matches_query(item, query))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.received_time.cmp(&a.received_time));
        let total_count = items.len() as i64;
        let data: Vec<SmsMessageRecord> = items
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

    async fn visible_message_ids(
        &self,
        scope: &AccessScope,
        device_id: Option<&str>,
        com_port: Option<&str>,
    ) -> Result<Vec<String>, StorageError> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }
        let messages = self
            .messages
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(messages
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

    async fn soft_delete_message(&self, id: &str) -> Result<bool, StorageError> {
        let mut messages = self
            .messages
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(item) = messages.iter_mut().find(|item| !item.is_deleted && item.id == id)
        else {
            return Ok(false);
        };
        item.is_deleted = true;
        Ok(true)
    }

    async fn hard_delete_message(&self, id: &str) -> Result<bool, StorageError> {
        let mut messages = self
            .messages
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let before = messages.len();
        messages.retain(|item| item.id != id);
        Ok(messages.len() < before)
    }
}
