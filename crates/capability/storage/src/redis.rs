//! Redis 刷新 token 存储实现
//!
//! 键格式 `smsgw:refresh:{jti}`，值为 user_id，TTL 即 refresh token 生命周期。
//! `take` 用 GETDEL 实现一次性旋转语义。

use crate::error::StorageError;
use crate::traits::RefreshTokenStore;
use redis::AsyncCommands;

fn refresh_key(jti: &str) -> String {
    format!("smsgw:refresh:{jti}")
}

/// Redis 刷新 token 存储
pub struct RedisRefreshTokenStore {
    client: redis::Client,
}

impl RedisRefreshTokenStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn connect(redis_url: &str) -> Result<Self, StorageError> {
        let client =
            redis::Client::open(redis_url).map_err(|err| StorageError::new(err.to_string()))?;
        Ok(Self::new(client))
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for RedisRefreshTokenStore {
    async fn store(
        &self,
        jti: &str,
        user_id: &str,
        ttl_seconds: u64,
    ) -> Result<(), StorageError> {
        let mut connection = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|err| StorageError::new(err.to_string()))?;
        connection
            .set_ex::<_, _, ()>(refresh_key(jti), user_id, ttl_seconds.max(1))
            .await
            .map_err(|err| StorageError::new(err.to_string()))?;
        Ok(())
    }

    async fn take(&self, jti: &str) -> Result<Option<String>, StorageError> {
        let mut connection = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|err| StorageError::new(err.to_string()))?;
        let user_id: Option<String> = redis::cmd("GETDEL")
            .arg(refresh_key(jti))
            .query_async(&mut connection)
            .await
            .map_err(|err| StorageError::new(err.to_string()))?;
        Ok(user_id)
    }

    async fn revoke(&self, jti: &str) -> Result<(), StorageError> {
        let mut connection = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|err| StorageError::new(err.to_string()))?;
        connection
            .del::<_, ()>(refresh_key(jti))
            .await
            .map_err(|err| StorageError::new(err.to_string()))?;
        Ok(())
    }
}
