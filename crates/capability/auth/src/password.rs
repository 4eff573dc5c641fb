//! 口令散列与校验。
//!
//! 新散列一律 argon2（PHC 串内嵌盐）；历史库里残留的明文口令在一次
//! 校验通过后就地升级为 argon2，明文比较走常数时间。

use crate::AuthError;
use argon2::{
    Argon2,
    PasswordHash,
    PasswordHasher,
    PasswordVerifier,
    password_hash::SaltString,
};
use rand_core::OsRng;
use subtle::ConstantTimeEq;

/// 校验结果。`upgrade_hash` 非空时调用方应回写新散列。
pub struct PasswordCheck {
    pub verified: bool,
    pub upgrade_hash: Option<String>,
}

impl PasswordCheck {
    fn rejected() -> Self {
        Self {
            verified: false,
            upgrade_hash: None,
        }
    }
}

/// 生成 argon2 PHC 散列串。
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AuthError::Internal(err.to_string()))?;
    Ok(hash.to_string())
}

/// 校验口令；旧格式命中时附带升级散列。
pub fn verify_password_and_maybe_upgrade(
    stored_password_hash: &str,
    password: &str,
) -> Result<PasswordCheck, AuthError> {
    if stored_password_hash.starts_with("$argon2") {
        let parsed = PasswordHash::new(stored_password_hash)
            .map_err(|err| AuthError::Internal(err.to_string()))?;
        let verified = Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok();
        return Ok(PasswordCheck {
            verified,
            upgrade_hash: None,
        });
    }

    // 历史明文：常数时间比较，命中即升级
    let verified: bool = stored_password_hash
        .as_bytes()
        .ct_eq(password.as_bytes())
        .into();
    if !verified {
        return Ok(PasswordCheck::rejected());
    }
    Ok(PasswordCheck {
        verified: true,
        upgrade_hash: Some(hash_password(password)?),
    })
}
