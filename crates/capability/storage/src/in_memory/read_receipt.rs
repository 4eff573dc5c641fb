//! 已读回执内存实现。
//!
//! 唯一键 (user_id, message_type, source_id) 用 HashSet 表达，重复写入
//! 返回 inserted=false 并视为成功。

use crate::error::StorageError;
use crate::models::{MessageReadReceiptRecord, MessageType, ReceiptWriteResult};
use crate::traits::ReadReceiptStore;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use uuid::Uuid;

type ReceiptKey = (String, MessageType);

/// 已读回执内存存储
pub struct InMemoryReadReceiptStore {
    receipts: RwLock<HashMap<ReceiptKey, HashSet<String>>>,
}

impl InMemoryReadReceiptStore {
    pub fn new() -> Self {
        Self {
            receipts: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryReadReceiptStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ReadReceiptStore for InMemoryReadReceiptStore {
    async fn mark_read(
        &self,
        user_id: &str,
        message_type: MessageType,
        source_id: &str,
    ) -> Result<ReceiptWriteResult, StorageError> {
        let mut receipts = self
            .receipts
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let set = receipts
            .entry((user_id.to_string(), message_type))
            .or_default();
        let inserted = set.insert(source_id.to_string());
        Ok(ReceiptWriteResult {
            record: MessageReadReceiptRecord {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                message_type,
                source_id: source_id.to_string(),
                read_time: Utc::now(),
            },
            inserted,
        })
    }

    async fn insert_missing(
        &self,
        user_id: &str,
        message_type: MessageType,
        source_ids: &[String],
    ) -> Result<u64, StorageError> {
        let mut receipts = self
            .receipts
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let set = receipts
            .entry((user_id.to_string(), message_type))
            .or_default();
        let mut inserted = 0u64;
        for source_id in source_ids {
            if set.insert(source_id.clone()) {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn read_source_ids(
        &self,
        user_id: &str,
        message_type: MessageType,
        source_ids: &[String],
    ) -> Result<HashSet<String>, StorageError> {
        let receipts = self
            .receipts
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(set) = receipts.get(&(user_id.to_string(), message_type)) else {
            return Ok(HashSet::new());
        };
        Ok(source_ids
            .iter()
            .filter(|source_id| set.contains(*source_id))
            .cloned()
            .collect())
    }
}
