//! Postgres 已读回执存储实现
//!
//! 幂等性由唯一索引 (user_id, message_type, source_id) + `on conflict do
//! nothing` 保证；并发重复插入恰得一行。

use crate::error::StorageError;
use crate::models::{MessageReadReceiptRecord, MessageType, ReceiptWriteResult};
use crate::traits::ReadReceiptStore;
use chrono::Utc;
use sqlx::{PgPool, Row};
use std::collections::HashSet;
use uuid::Uuid;

/// PostgreSQL 已读回执存储实现
pub struct PgReadReceiptStore {
    pub pool: PgPool,
}

impl PgReadReceiptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReadReceiptStore for PgReadReceiptStore {
    async fn mark_read(
        &self,
        user_id: &str,
        message_type: MessageType,
        source_id: &str,
    ) -> Result<ReceiptWriteResult, StorageError> {
        let record = MessageReadReceiptRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            message_type,
            source_id: source_id.to_string(),
            read_time: Utc::now(),
        };
        let result = sqlx::query(
            "insert into message_read_receipts (id, user_id, message_type, source_id, read_time) \
             values ($1, $2, $3, $4, $5) \
             on conflict (user_id, message_type, source_id) do nothing",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(record.message_type.as_str())
        .bind(&record.source_id)
        .bind(record.read_time)
        .execute(&self.pool)
        .await?;
        Ok(ReceiptWriteResult {
            record,
            inserted: result.rows_affected() > 0,
        })
    }

    async fn insert_missing(
        &self,
        user_id: &str,
        message_type: MessageType,
        source_ids: &[String],
    ) -> Result<u64, StorageError> {
        if source_ids.is_empty() {
            return Ok(0);
        }
        // 一条语句完成展开 + 去重插入，天然原子
        let result = sqlx::query(
            "insert into message_read_receipts (id, user_id, message_type, source_id, read_time) \
             select gen_random_uuid()::text, $1, $2, t.source_id, now() \
             from unnest($3::text[]) as t(source_id) \
             on conflict (user_id, message_type, source_id) do nothing",
        )
        .bind(user_id)
        .bind(message_type.as_str())
        .bind(source_ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn read_source_ids(
        &self,
        user_id: &str,
        message_type: MessageType,
        source_ids: &[String],
    ) -> Result<HashSet<String>, StorageError> {
        if source_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query(
            "select source_id from message_read_receipts \
             where user_id = $1 and message_type = $2 and source_id = any($3)",
        )
        .bind(user_id)
        .bind(message_type.as_str())
        .bind(source_ids)
        .fetch_all(&self.pool)
        .await?;
        let mut ids = HashSet::with_capacity(rows.len());
        for row in rows {
            ids.insert(row.try_get("source_id")?);
        }
        Ok(ids)
    }
}
