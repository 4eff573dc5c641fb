//! Postgres 用户存储实现
//!
//! 通过 SQL 查询实现 [`UserStore`] trait。
//!
//! ## 设计要点
//!
//! - 默认查询排除软删除行（`is_deleted = false`）
//! - 用户名唯一索引冲突映射为 `StorageError::conflict`（上层返回 409）
//! - 参数化查询防止 SQL 注入

use crate::error::StorageError;
use crate::models::{UserRecord, UserUpdate};
use crate::traits::UserStore;
use sqlx::{PgPool, Row};

/// PostgreSQL 用户存储实现
pub struct PgUserStore {
    pub pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 从数据库 URL 创建用户存储实例。
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = crate::connection::connect_pool(database_url).await?;
        Ok(Self { pool })
    }
}

fn row_to_user(row: &sqlx::postgres::PgRow) -> Result<UserRecord, StorageError> {
    Ok(UserRecord {
        id: row.try_get("id")?,
        user_name: row.try_get("user_name")?,
        password_hash: row.try_get("password_hash")?,
        role: row.try_get("role")?,
        is_deleted: row.try_get("is_deleted")?,
        create_time: row.try_get("create_time")?,
        update_time: row.try_get("update_time")?,
    })
}

const USER_COLUMNS: &str =
    "id, user_name, password_hash, role, is_deleted, create_time, update_time";

#[async_trait::async_trait]
impl UserStore for PgUserStore {
    async fn find_by_user_name(
        &self,
        user_name: &str,
    ) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "select {USER_COLUMNS} from users where user_name = $1 and is_deleted = false",
        ))
        .bind(user_name)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_user(&row)?))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "select {USER_COLUMNS} from users where id = $1 and is_deleted = false",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_user(&row)?))
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {USER_COLUMNS} from users where is_deleted = false order by create_time",
        ))
        .fetch_all(&self.pool)
        .await?;
        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            users.push(row_to_user(&row)?);
        }
        Ok(users)
    }

    async fn create_user(&self, record: UserRecord) -> Result<UserRecord, StorageError> {
        sqlx::query(
            "insert into users (id, user_name, password_hash, role, is_deleted, create_time, update_time) \
             values ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&record.id)
        .bind(&record.user_name)
        .bind(&record.password_hash)
        .bind(&record.role)
        .bind(record.is_deleted)
        .bind(record.create_time)
        .bind(record.update_time)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn update_user(
        &self,
        id: &str,
        update: UserUpdate,
    ) -> Result<Option<UserRecord>, StorageError> {
        // coalesce 实现部分更新：参数为 None 时保留原值
        let row = sqlx::query(&format!(
            "update users set \
             password_hash = coalesce($1, password_hash), \
             role = coalesce($2, role), \
             update_time = now() \
             where id = $3 and is_deleted = false \
             returning {USER_COLUMNS}",
        ))
        .bind(update.password_hash)
        .bind(update.role)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_user(&row)?))
    }

    async fn delete_user(&self, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "update users set is_deleted = true, update_time = now() \
             where id = $1 and is_deleted = false",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
