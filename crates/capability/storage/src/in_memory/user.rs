//! 用户内存实现。

use crate::error::StorageError;
use crate::models::{UserRecord, UserUpdate};
use crate::traits::UserStore;
use chrono::Utc;
use std::sync::RwLock;

/// 用户内存存储
pub struct InMemoryUserStore {
    users: RwLock<Vec<UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
        }
    }

    /// 预置一条 admin 用户（口令散列由调用方提供）。
    pub fn with_admin(password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            users: RwLock::new(vec![UserRecord {
                id: "user-admin".to_string(),
                user_name: "admin".to_string(),
                password_hash: password_hash.into(),
                role: "Admin".to_string(),
                is_deleted: false,
                create_time: now,
                update_time: now,
            }]),
        }
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_user_name(
        &self,
        user_name: &str,
    ) -> Result<Option<UserRecord>, StorageError> {
        let users = self
            .users
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(users
            .iter()
            .find(|user| !user.is_deleted && user.user_name == user_name)
            .cloned())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, StorageError> {
        let users = self
            .users
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(users
            .iter()
            .find(|user| !user.is_deleted && user.id == id)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        let users = self
            .users
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(users.iter().filter(|user| !user.is_deleted).cloned().collect())
    }

    async fn create_user(&self, record: UserRecord) -> Result<UserRecord, StorageError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if users
            .iter()
            .any(|user| !user.is_deleted && user.user_name == record.user_name)
        {
            return Err(StorageError::conflict("user name already exists"));
        }
        users.push(record.clone());
        Ok(record)
    }

    async fn update_user(
        &self,
        id: &str,
        update: UserUpdate,
    ) -> Result<Option<UserRecord>, StorageError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(user) = users.iter_mut().find(|user| !user.is_deleted && user.id == id) else {
            return Ok(None);
        };
        if let Some(password_hash) = update.password_hash {
            user.password_hash = password_hash;
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        user.update_time = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: &str) -> Result<bool, StorageError> {
        let mut users = self
            .users
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let Some(user) = users.iter_mut().find(|user| !user.is_deleted && user.id == id) else {
            return Ok(false);
        };
        user.is_deleted = true;
        user.update_time = Utc::now();
        Ok(true)
    }
}
