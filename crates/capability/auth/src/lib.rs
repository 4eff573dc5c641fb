//! 认证能力：登录、JWT 生成与校验、refresh token 旋转。

mod jwt;
mod password;

use domain::{AuthContext, Role};
use smsgw_storage::{RefreshTokenStore, UserRecord, UserStore, UserUpdate};
use std::sync::Arc;
use tracing::warn;

pub use jwt::JwtManager;
pub use password::{hash_password, verify_password_and_maybe_upgrade};

/// 认证相关错误。
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("token expired")]
    TokenExpired,
    #[error("token invalid")]
    TokenInvalid,
    #[error("internal error: {0}")]
    Internal(String),
}

/// 登录/刷新返回的 token 结构。
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_jti: String,
    pub expires_at: u64,
}

/// 认证服务实现（UserStore + JWT + RefreshTokenStore）。
pub struct AuthService {
    user_store: Arc<dyn UserStore>,
    refresh_store: Arc<dyn RefreshTokenStore>,
    jwt: JwtManager,
    refresh_ttl_seconds: u64,
}

impl AuthService {
    /// 创建认证服务实例。
    pub fn new(
        user_store: Arc<dyn UserStore>,
        refresh_store: Arc<dyn RefreshTokenStore>,
        jwt: JwtManager,
        refresh_ttl_seconds: u64,
    ) -> Self {
        Self {
            user_store,
            refresh_store,
            jwt,
            refresh_ttl_seconds,
        }
    }

    /// 登录校验并签发 token；旧格式口令散列在校验通过后就地升级。
    pub async fn login(
        &self,
        user_name: &str,
        password: &str,
    ) -> Result<(UserRecord, AuthTokens), AuthError> {
        let user = self
            .user_store
            .find_by_user_name(user_name)
            .await
            .map_err(|err| AuthError::Internal(err.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;
        let check = password::verify_password_and_maybe_upgrade(&user.password_hash, password)?;
        if !check.verified {
            return Err(AuthError::InvalidCredentials);
        }
        if let Some(upgrade_hash) = check.upgrade_hash {
            // 升级失败不阻断登录
            if let Err(err) = self
                .user_store
                .update_user(
                    &user.id,
                    UserUpdate {
                        password_hash: Some(upgrade_hash),
                        role: None,
                    },
                )
                .await
            {
                warn!(user_name = %user.user_name, error = %err, "password hash upgrade failed");
            }
        }
        let ctx = user_context(&user);
        let tokens = self.issue_and_store(&ctx).await?;
        Ok((user, tokens))
    }

    /// 校验 access token 并提取 AuthContext。
    pub fn verify_access_token(&self, token: &str) -> Result<AuthContext, AuthError> {
        self.jwt.decode_access(token)
    }

    /// 使用 refresh token 换取新 token。旧 jti 一次性消费（旋转）。
    pub async fn refresh(&self, token: &str) -> Result<AuthTokens, AuthError> {
        let (ctx, jti) = self.jwt.decode_refresh_with_jti(token)?;
        let stored_user = self
            .refresh_store
            .take(&jti)
            .await
            .map_err(|err| AuthError::Internal(err.to_string()))?;
        match stored_user {
            Some(user_id) if user_id == ctx.user_id => {}
            // 已消费或被吊销的 jti 一律视为无效
            _ => return Err(AuthError::TokenInvalid),
        }
        self.issue_and_store(&ctx).await
    }

    async fn issue_and_store(&self, ctx: &AuthContext) -> Result<AuthTokens, AuthError> {
        let tokens = self.jwt.issue_tokens(ctx)?;
        self.refresh_store
            .store(&tokens.refresh_jti, &ctx.user_id, self.refresh_ttl_seconds)
            .await
            .map_err(|err| AuthError::Internal(err.to_string()))?;
        Ok(tokens)
    }
}

fn user_context(user: &UserRecord) -> AuthContext {
    AuthContext::new(
        user.id.clone(),
        user.user_name.clone(),
        Role::parse(&user.role),
    )
}
