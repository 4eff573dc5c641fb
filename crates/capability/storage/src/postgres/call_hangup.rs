//! Postgres 挂断记录存储实现
//!
//! 挂断可见性比短信多一层设备集合判定：
//! `($1 or (upper(device_id) = any($2) and upper(com_port) = any($3)))`。

use crate::error::StorageError;
use crate::models::CallHangupRecord;
use crate::postgres::{contains_bind, exact_bind, scope_binds};
use crate::scope::{AccessScope, CallHangupQuery, Page, PageRequest};
use crate::traits::CallHangupStore;
use sqlx::{PgPool, Row};

/// PostgreSQL 挂断记录存储实现
pub struct PgCallHangupStore {
    pub pool: PgPool,
}

impl PgCallHangupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const HANGUP_COLUMNS: &str =
    "id, device_id, com_port, caller_number, hangup_time, reason, raw_line, is_deleted";

const HANGUP_VISIBILITY: &str =
    "($1 or (upper(device_id) = any($2) and upper(com_port) = any($3))) \
     and (is_deleted = false or $4) \
     and ($5::text is null or upper(device_id) = $5) \
     and ($6::text is null or upper(com_port) = $6) \
     and ($7::text is null or caller_number like '%' || $7 || '%') \
     and ($8::timestamptz is null or hangup_time >= $8) \
     and ($9::timestamptz is null or hangup_time <= $9)";

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<CallHangupRecord, StorageError> {
    Ok(CallHangupRecord {
        id: row.try_get("id")?,
        device_id: row.try_get("device_id")?,
        com_port: row.try_get("com_port")?,
        caller_number: row.try_get("caller_number")?,
        hangup_time: row.try_get("hangup_time")?,
        reason: row.try_get("reason")?,
        raw_line: row.try_get("raw_line")?,
        is_deleted: row.try_get("is_deleted")?,
    })
}

#[async_trait::async_trait]
impl CallHangupStore for PgCallHangupStore {
    async fn insert_record(
        &self,
        record: CallHangupRecord,
    ) -> Result<CallHangupRecord, StorageError> {
        sqlx::query(
            "insert into call_hangup_records (id, device_id, com_port, caller_number, hangup_time, \
             reason, raw_line, is_deleted) values ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&record.id)
        .bind(&record.device_id)
        .bind(&record.com_port)
        .bind(&record.caller_number)
        .bind(record.hangup_time)
        .bind(&record.reason)
        .bind(&record.raw_line)
        .bind(record.is_deleted)
        .execute(&self.pool)
        .await?;
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
        let (admin, device_ids, com_ports, include_deleted) = scope_binds(scope);
        let device_filter = exact_bind(&query.device_id);
        let port_filter = exact_bind(&query.com_port);
        let caller_filter = contains_bind(&query.caller_contains);

        let count_row = sqlx::query(&format!(
            "select count(*) as total from call_hangup_records where {HANGUP_VISIBILITY}",
        ))
        .bind(admin)
        .bind(&device_ids)
        .bind(&com_ports)
        .bind(include_deleted)
        .bind(&device_filter)
        .bind(&port_filter)
        .bind(&caller_filter)
        .bind(query.start_time)
        .bind(query.end_time)
        .fetch_one(&self.pool)
        .await?;
        let total_count: i64 = count_row.try_get("total")?;

        let rows = sqlx::query(&format!(
            "select {HANGUP_COLUMNS} from call_hangup_records where {HANGUP_VISIBILITY} \
             order by hangup_time desc limit $10 offset $11",
        ))
        .bind(admin)
        .bind(&device_ids)
        .bind(&com_ports)
        .bind(include_deleted)
        .bind(&device_filter)
        .bind(&port_filter)
        .bind(&caller_filter)
        .bind(query.start_time)
        .bind(query.end_time)
        .bind(page.page_size)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let mut data = Vec::with_capacity(rows.len());
        for row in rows {
            data.push(row_to_record(&row)?);
        }
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
        let (admin, device_ids, com_ports, _include_deleted) = scope_binds(scope);
        let device_filter = exact_bind(&device_id.map(|value| value.to_string()));
        let port_filter = exact_bind(&com_port.map(|value| value.to_string()));
        let rows = sqlx::query(
            "select id from call_hangup_records \
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

    async fn soft_delete_record(&self, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "update call_hangup_records set is_deleted = true where id = $1 and is_deleted = false",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn hard_delete_record(&self, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query("delete from call_hangup_records where id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
