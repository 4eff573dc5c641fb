//! 备注内存实现。

use crate::error::StorageError;
use crate::models::{NoteRecord, NoteUpdate};
use crate::traits::NoteStore;
use chrono::Utc;
use std::sync::RwLock;

/// 备注内存存储
pub struct InMemoryNoteStore {
    notes: RwLock<Vec<NoteRecord>>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self {
            notes: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryNoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NoteStore for InMemoryNoteStore {
    async fn list_notes(&self, user_id: &str) -> Result<Vec<NoteRecord>, StorageError> {
        let notes = self
            .notes
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<NoteRecord> = notes
            .iter()
            .filter(|item| !item.is_deleted && item.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.update_time.cmp(&a.update_time));
        Ok(items)
    }

    async fn find_note(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<Option<NoteRecord>, StorageError> {
        let notes = self
            .notes
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(notes
            .iter()
            .find(|item| !item.is_deleted && item.user_id == user_id && item.id == id)
            .cloned())
    }

    async fn create_note(&self, record: NoteRecord) -> Result<NoteRecord, StorageError> {
        let mut notes = self
            .notes
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        notes.push(record.clone());
        Ok(record)
    }

    async fn update_note(
        &self,
        user_id: &str,
        id: &str,
        update: NoteUpdate,
    ) -> Result<Option<NoteRecord>, StorageError> {
        let mut notes = self
            .notes
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(item) = notes
            .iter_mut()
            .find(|item| !item.is_deleted && item.user_id == user_id && item.id == id)
        else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            item.title = title;
        }
        if let Some(content) = update.content {
            item.content = content;
        }
        item.update_time = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn delete_note(&self, user_id: &str, id: &str) -> Result<bool, StorageError> {
        let mut notes = self
            .notes
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(item) = notes
            .iter_mut()
            .find(|item| !item.is_deleted && item.user_id == user_id && item.id == id)
        else {
            return Ok(false);
        };
        item.is_deleted = true;
        item.update_time = Utc::now();
        Ok(true)
    }
}
