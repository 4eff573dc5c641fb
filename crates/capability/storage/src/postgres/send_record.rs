//! Postgres 发送记录存储实现。

use crate::error::StorageError;
use crate::models::SmsSendRecord;
use crate::traits::SendRecordStore;
use sqlx::{PgPool, Row};

/// PostgreSQL 发送记录存储实现
pub struct PgSendRecordStore {
    pub pool: PgPool,
}

impl PgSendRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SEND_COLUMNS: &str = "id, device_id, com_port, target_number, message_content, status, \
     error_message, create_time, update_time";

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<SmsSendRecord, StorageError> {
    Ok(SmsSendRecord {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        com_port: row.try_get("com_port")?,
        target_number: row.try_get("target_number")?,
        message_content: row.try_get("message_content")?,
        status: row.try_get("status")?,
        error_message: row.try_get("error_message")?,
        create_time: row.try_get("create_time")?,
        update_time: row.try_get("update_time")?,
    })
}

#[async_trait::async_trait]
impl SendRecordStore for PgSendRecordStore {
    async fn create_record(&self, record: SmsSendRecord) -> Result<SmsSendRecord, StorageError> {
        sqlx::query(
            "insert into sms_send_records (id, device_id, com_port, target_number, message_content, \
             status, error_message, create_time, update_time) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&record.id)
        .bind(&record.device_id)
        .bind(&record.com_port)
        .bind(&record.target_number)
        .bind(&record.message_content)
        .bind(&record.status)
        .bind(&record.error_message)
        .bind(record.create_time)
        .bind(record.update_time)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn find_record(&self, id: &str) -> Result<Option<SmsSendRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "select {SEND_COLUMNS} from sms_send_records where id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_record(&row)?))
    }

    async fn update_status(
        &self,
        id: &str,
        status: &str,
        error_message: Option<&str>,
    ) -> Result<Option<SmsSendRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "update sms_send_records set status = $1, error_message = $2, update_time = now() \
             where id = $3 returning {SEND_COLUMNS}",
        ))
        .bind(status)
        .bind(error_message)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_record(&row)?))
    }
}
