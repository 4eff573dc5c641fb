use smsgw_auth::{AuthService, JwtManager, hash_password};
use smsgw_storage::{InMemoryRefreshTokenStore, InMemoryUserStore};
use std::sync::Arc;

fn service() -> AuthService {
    let hash = hash_password("admin123").expect("hash");
    let users = Arc::new(InMemoryUserStore::with_admin(hash));
    let refresh = Arc::new(InMemoryRefreshTokenStore::new());
    let jwt = JwtManager::new("secret-1".to_string(), 3600, 7200);
    AuthService::new(users, refresh, jwt, 7200)
}

#[tokio::test]
async fn login_then_refresh_rotates_jti() {
    let service = service();
    let (user, tokens) = service.login("admin", "admin123").await.expect("login");
    assert_eq!(user.user_name, "admin");

    let rotated = service.refresh(&tokens.refresh_token).await.expect("refresh");
    assert_ne!(rotated.refresh_jti, tokens.refresh_jti);

    // 旧 refresh token 已被消费，二次使用拒绝
    assert!(service.refresh(&tokens.refresh_token).await.is_err());

    // 新 token 仍可继续旋转
    assert!(service.refresh(&rotated.refresh_token).await.is_ok());
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let service = service();
    assert!(service.login("admin", "wrong").await.is_err());
    assert!(service.login("ghost", "admin123").await.is_err());
}

#[tokio::test]
async fn access_token_identifies_admin() {
    let service = service();
    let (_, tokens) = service.login("admin", "admin123").await.expect("login");
    let ctx = service
        .verify_access_token(&tokens.access_token)
        .expect("verify");
    assert!(ctx.is_admin());
    assert_eq!(ctx.user_name, "admin");
}
