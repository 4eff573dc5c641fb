//! Postgres COM 分配存储实现
//!
//! `com_ports` 以 JSON 数组文本存于 `com_ports_json` 列（见 SPEC_FULL 6.3 的
//! 持久化格式约定），读写时经 serde_json 转换。

use crate::error::StorageError;
use crate::models::{ComAllocationRecord, ComAllocationUpdate};
use crate::traits::ComAllocationStore;
use sqlx::{PgPool, Row};

/// PostgreSQL COM 分配存储实现
pub struct PgComAllocationStore {
    pub pool: PgPool,
}

impl PgComAllocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ALLOCATION_COLUMNS: &str =
    "id, user_id, device_id, com_ports_json, is_deleted, create_time, update_time";

fn row_to_allocation(row: &sqlx::postgres::PgRow) -> Result<ComAllocationRecord, StorageError> {
    let com_ports_json: String = row.try_get("com_ports_json")?;
    let com_ports: Vec<String> = serde_json::from_str(&com_ports_json)
        .map_err(|err| StorageError::new(format!("com_ports_json: {err}")))?;
    Ok(ComAllocationRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        device_id: row.try_get("device_id")?,
        com_ports,
        is_deleted: row.try_get("is_deleted")?,
        create_time: row.try_get("create_time")?,
        update_time: row.try_get("update_time")?,
    })
}

fn ports_to_json(com_ports: &[String]) -> Result<String, StorageError> {
    serde_json::to_string(com_ports)
        .map_err(|err| StorageError::new(format!("com_ports_json: {err}")))
}

#[async_trait::async_trait]
impl ComAllocationStore for PgComAllocationStore {
    async fn list_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<ComAllocationRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {ALLOCATION_COLUMNS} from com_allocations \
             where user_id = $1 and is_deleted = false order by create_time",
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let mut allocations = Vec::with_capacity(rows.len());
        for row in rows {
            allocations.push(row_to_allocation(&row)?);
        }
        Ok(allocations)
    }

    async fn list_all(&self) -> Result<Vec<ComAllocationRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {ALLOCATION_COLUMNS} from com_allocations \
             where is_deleted = false order by create_time",
        ))
        .fetch_all(&self.pool)
        .await?;
        let mut allocations = Vec::with_capacity(rows.len());
        for row in rows {
            allocations.push(row_to_allocation(&row)?);
        }
        Ok(allocations)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ComAllocationRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "select {ALLOCATION_COLUMNS} from com_allocations \
             where id = $1 and is_deleted = false",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_allocation(&row)?))
    }

    async fn create_allocation(
        &self,
        record: ComAllocationRecord,
    ) -> Result<ComAllocationRecord, StorageError> {
        sqlx::query(
            "insert into com_allocations (id, user_id, device_id, com_ports_json, is_deleted, create_time, update_time) \
             values ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.device_id)
        .bind(ports_to_json(&record.com_ports)?)
        .bind(record.is_deleted)
        .bind(record.create_time)
        .bind(record.update_time)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn update_allocation(
        &self,
        id: &str,
        update: ComAllocationUpdate,
    ) -> Result<Option<ComAllocationRecord>, StorageError> {
        let com_ports_json = match &update.com_ports {
            Some(com_ports) => Some(ports_to_json(com_ports)?),
            None => None,
        };
        let row = sqlx::query(&format!(
            "update com_allocations set \
             device_id = coalesce($1, device_id), \
             com_ports_json = coalesce($2, com_ports_json), \
             update_time = now() \
             where id = $3 and is_deleted = false \
             returning {ALLOCATION_COLUMNS}",
        ))
        .bind(update.device_id)
        .bind(com_ports_json)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_allocation(&row)?))
    }

    async fn delete_allocation(&self, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "update com_allocations set is_deleted = true, update_time = now() \
             where id = $1 and is_deleted = false",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
