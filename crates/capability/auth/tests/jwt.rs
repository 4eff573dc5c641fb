use domain::{AuthContext, Role};
use smsgw_auth::JwtManager;

fn ctx() -> AuthContext {
    AuthContext::new("user-1", "alice", Role::User)
}

#[test]
fn access_token_round_trips_identity() {
    let jwt = JwtManager::new("secret-1".to_string(), 3600, 7200);
    let tokens = jwt.issue_tokens(&ctx()).expect("issue");
    let decoded = jwt.decode_access(&tokens.access_token).expect("decode");
    assert_eq!(decoded.user_id, "user-1");
    assert_eq!(decoded.user_name, "alice");
    assert_eq!(decoded.role, Role::User);
}

#[test]
fn refresh_token_carries_jti() {
    let jwt = JwtManager::new("secret-1".to_string(), 3600, 7200);
    let tokens = jwt.issue_tokens(&ctx()).expect("issue");
    let (decoded, jti) = jwt
        .decode_refresh_with_jti(&tokens.refresh_token)
        .expect("decode");
    assert_eq!(decoded.user_id, "user-1");
    assert_eq!(jti, tokens.refresh_jti);
}

#[test]
fn token_types_are_not_interchangeable() {
    let jwt = JwtManager::new("secret-1".to_string(), 3600, 7200);
    let tokens = jwt.issue_tokens(&ctx()).expect("issue");
    assert!(jwt.decode_access(&tokens.refresh_token).is_err());
    assert!(jwt.decode_refresh_with_jti(&tokens.access_token).is_err());
}

#[test]
fn wrong_secret_is_rejected() {
    let jwt = JwtManager::new("secret-1".to_string(), 3600, 7200);
    let other = JwtManager::new("secret-2".to_string(), 3600, 7200);
    let tokens = jwt.issue_tokens(&ctx()).expect("issue");
    assert!(other.decode_access(&tokens.access_token).is_err());
}

#[test]
fn expired_token_is_rejected() {
    let jwt = JwtManager::new("secret-1".to_string(), 0, 0);
    let tokens = jwt.issue_tokens(&ctx()).expect("issue");
    // exp == now，jsonwebtoken 默认 leeway 60s，置零后立即过期
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.leeway = 0;
    validation.insecure_disable_signature_validation();
    validation.validate_exp = true;
    let result = jsonwebtoken::decode::<serde_json::Value>(
        &tokens.access_token,
        &jsonwebtoken::DecodingKey::from_secret(b"secret-1"),
        &validation,
    );
    assert!(result.is_err());
}
