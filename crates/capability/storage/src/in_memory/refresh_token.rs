//! 刷新 token 内存实现（用于测试与本地运行，不做 TTL 过期）。

use crate::error::StorageError;
use crate::traits::RefreshTokenStore;
use std::collections::HashMap;
use std::sync::RwLock;

pub struct InMemoryRefreshTokenStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryRefreshTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn store(
        &self,
        jti: &str,
        user_id: &str,
        _ttl_seconds: u64,
    ) -> Result<(), StorageError> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        tokens.insert(jti.to_string(), user_id.to_string());
        Ok(())
    }

    async fn take(&self, jti: &str) -> Result<Option<String>, StorageError> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(tokens.remove(jti))
    }

    async fn revoke(&self, jti: &str) -> Result<(), StorageError> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        tokens.remove(jti);
        Ok(())
    }
}
