//! Postgres 设备快照存储实现
//!
//! 覆盖语义：同一事务内先删后插，保证每个 device_id 至多一条。

use crate::error::StorageError;
use crate::models::DeviceComSnapshotRecord;
use crate::traits::SnapshotStore;
use sqlx::{PgPool, Row};

/// PostgreSQL 设备快照存储实现
pub struct PgSnapshotStore {
    pub pool: PgPool,
}

impl PgSnapshotStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn upsert_snapshot(
        &self,
        record: DeviceComSnapshotRecord,
    ) -> Result<DeviceComSnapshotRecord, StorageError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("delete from device_com_snapshots where device_id = $1")
            .bind(&record.device_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "insert into device_com_snapshots (device_id, data_json, updated_time) \
             values ($1, $2, $3)",
        )
        .bind(&record.device_id)
        .bind(&record.data_json)
        .bind(record.updated_time)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn find_snapshot(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceComSnapshotRecord>, StorageError> {
        let row = sqlx::query(
            "select device_id, data_json, updated_time from device_com_snapshots \
             where device_id = $1",
        )
        .bind(device_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(DeviceComSnapshotRecord {
            device_id: row.try_get("device_id")?,
            data_json: row.try_get("data_json")?,
            updated_time: row.try_get("updated_time")?,
        }))
    }
}
