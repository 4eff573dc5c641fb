//! Postgres 短信存储实现
//!
//! ## 设计要点
//!
//! - 可见性条件编译进 SQL：管理员 $1 为 true，普通用户携带归一化的
//!   设备集合与端口并集，两者须同时命中
//! - 软删除行默认排除，`include_deleted` 仅对管理员生效
//! - 查询过滤（设备/端口精确、发送方模糊、时间区间）用可空参数表达，
//!   NULL 即未提供
//! - 排序固定 received_time 降序，分页 limit/offset

use crate::error::StorageError;
use crate::models::SmsMessageRecord;
use crate::postgres::{contains_bind, exact_bind, scope_binds};
use crate::scope::{AccessScope, Page, PageRequest, SmsMessageQuery};
use crate::traits::SmsMessageStore;
use sqlx::{PgPool, Row};

/// PostgreSQL 短信存储实现
pub struct PgSmsMessageStore {
    pub pool: PgPool,
}

impl PgSmsMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SMS_COLUMNS: &str = "id, device_id, com_port, sender_number, message_content, \
     received_time, sms_timestamp, operator, is_deleted";

const SMS_VISIBILITY: &str =
    "($1 or (upper(device_id) = any($2) and upper(com_port) = any($3))) \
     and (is_deleted = false or $4) \
     and ($5::text is null or upper(device_id) = $5) \
     and ($6::text is null or upper(com_port) = $6) \
     and ($7::text is null or sender_number like '%' || $7 || '%') \
     and ($8::timestamptz is null or received_time >= $8) \
     and ($9::timestamptz is null or received_time <= $9)";

fn row_to_message(row: &sqlx::postgres::PgRow) -> Result<SmsMessageRecord, StorageError> {
    Ok(SmsMessageRecord {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        com_port: row.try_get("com_port")?,
        sender_number: row.try_get("sender_number")?,
        message_content: row.try_get("message_content")?,
        received_time: row.try_get("received_time")?,
        sms_timestamp: row.try_get("sms_timestamp")?,
        operator: row.try_get("operator")?,
        is_deleted: row.try_get("is_deleted")?,
    })
}

#[async_trait::async_trait]
impl SmsMessageStore for PgSmsMessageStore {
    async fn insert_message(
        &self,
        record: SmsMessageRecord,
    ) -> Result<SmsMessageRecord, StorageError> {
        sqlx::query(
            "insert into sms_messages (id, device_id, com_port, sender_number, message_content, \
             received_time, sms_timestamp, operator, is_deleted) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&record.id)
        .bind(&record.device_id)
        .bind(&record.com_port)
        .bind(&record.sender_number)
        .bind(&record.message_content)
        .bind(record.received_time)
        .bind(&record.sms_timestamp)
        .bind(&record.operator)
        .bind(record.is_deleted)
        .execute(&self.pool)
        .await?;
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
        let (admin, device_ids, com_ports, include_deleted) = scope_binds(scope);
        let device_filter = exact_bind(&query.device_id);
        let port_filter = exact_bind(&query.com_port);
        let sender_filter = contains_bind(&query.sender_contains);

        let count_row = sqlx::query(&format!(
            "select count(*) as total from sms_messages where {SMS_VISIBILITY}",
        ))
        .bind(admin)
        .bind(&device_ids)
        .bind(&com_ports)
        .bind(include_deleted)
        .bind(&device_filter)
        .bind(&port_filter)
        .bind(&sender_filter)
        .bind(query.start_time)
        .bind(query.end_time)
        .fetch_one(&self.pool)
        .await?;
        let total_count: i64 = count_row.try_get("total")?;

        let rows = sqlx::query(&format!(
            "select {SMS_COLUMNS} from sms_messages where {SMS_VISIBILITY} \
             order by received_time desc limit $10 offset $11",
        ))
        .bind(admin)
        .bind(&device_ids)
        .bind(&com_ports)
        .bind(include_deleted)
        .bind(&device_filter)
        .bind(&port_filter)
        .bind(&sender_filter)
        .bind(query.start_time)
        .bind(query.end_time)
        .bind(page.page_size)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            data.push(row_to_message(&row)?);
        }
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
        let (admin, device_ids, com_ports, _include_deleted) = scope_binds(scope);
        let device_filter = exact_bind(&device_id.map(|value| value.to_string()));
        let port_filter = exact_bind(&com_port.map(|value| value.to_string()));
        let rows = sqlx::query(
            "select id from sms_messages \
             where ($1 or (upper(device_id) = any($2) and upper(com_port) = any($3))) \
             and is_deleted = false \
             and ($4::text is null or upper(device_id) = $4) \
             and ($5::text is null or upper(com_port) = $5)",
        )
        .bind(admin)
        .bind(&device_ids)
        .bind(&com_ports)
        .bind(&device_filter)
        .bind(&port_filter)
        .fetch_all(&self.pool)
        .await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get("id")?);
        }
        Ok(ids)
    }

    async fn soft_delete_message(&self, id: &str) -> Result<bool, StorageError> {
        let result =
            sqlx::query("update sms_messages set is_deleted = true where id = $1 and is_deleted = false")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn hard_delete_message(&self, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from sms_messages where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
