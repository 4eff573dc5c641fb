//! Postgres 备注存储实现。

use crate::error::StorageError;
use crate::models::{NoteRecord, NoteUpdate};
use crate::traits::NoteStore;
use sqlx::{PgPool, Row};

/// PostgreSQL 备注存储实现
pub struct PgNoteStore {
    pub pool: PgPool,
}

impl PgNoteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const NOTE_COLUMNS: &str = "id, user_id, title, content, is_deleted, create_time, update_time";

fn row_to_note(row: &sqlx::postgres::PgRow) -> Result<NoteRecord, StorageError> {
    Ok(NoteRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        is_deleted: row.try_get("is_deleted")?,
        create_time: row.try_get("create_time")?,
        update_time: row.try_get("update_time")?,
    })
}

#[async_trait::async_trait]
impl NoteStore for PgNoteStore {
    async fn list_notes(&self, user_id: &str) -> Result<Vec<NoteRecord>, StorageError> {
        let rows = sqlx::query(&format!(
            "select {NOTE_COLUMNS} from notes \
             where user_id = $1 and is_deleted = false order by update_time desc",
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let mut notes = Vec::with_capacity(rows.len());
        for row in rows {
            notes.push(row_to_note(&row)?);
        }
        Ok(notes)
    }

    async fn find_note(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<Option<NoteRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "select {NOTE_COLUMNS} from notes \
             where user_id = $1 and id = $2 and is_deleted = false",
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_note(&row)?))
    }

    async fn create_note(&self, record: NoteRecord) -> Result<NoteRecord, StorageError> {
        sqlx::query(
            "insert into notes (id, user_id, title, content, is_deleted, create_time, update_time) \
             values ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.title)
        .bind(&record.content)
        .bind(record.is_deleted)
        .bind(record.create_time)
        .bind(record.update_time)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn update_note(
        &self,
        user_id: &str,
        id: &str,
        update: NoteUpdate,
    ) -> Result<Option<NoteRecord>, StorageError> {
        let row = sqlx::query(&format!(
            "update notes set \
             title = coalesce($1, title), \
             content = coalesce($2, content), \
             update_time = now() \
             where user_id = $3 and id = $4 and is_deleted = false \
             returning {NOTE_COLUMNS}",
        ))
        .bind(update.title)
        .bind(update.content)
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(row_to_note(&row)?))
    }

    async fn delete_note(&self, user_id: &str, id: &str) -> Result<bool, StorageError> {
        let result = sqlx::query(
            "update notes set is_deleted = true, update_time = now() \
             where user_id = $1 and id = $2 and is_deleted = false",
        )
        .bind(user_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
