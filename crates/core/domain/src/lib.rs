//! 所有模块共享的执行上下文与角色模型。

use serde::{Deserialize, Serialize};

/// 用户角色。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// 普通用户：仅能看到 COM 分配范围内的数据。
    User,
    /// 管理员：可见全部数据与软删除记录。
    Admin,
}

impl Role {
    /// 从存储的角色字符串解析，未知值按最小权限处理。
    pub fn parse(value: &str) -> Role {
        match value {
            "Admin" | "admin" => Role::Admin,
            _ => Role::User,
        }
    }

    /// 角色的存储字符串。
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Admin => "Admin",
        }
    }
}

/// 认证上下文：经过 JWT 校验后贯穿请求处理的身份信息。
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub user_name: String,
    pub role: Role,
}

impl AuthContext {
    /// 构造显式身份的认证上下文。
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            role,
        }
    }

    /// 是否为管理员。
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl Default for AuthContext {
    /// 空上下文（仅用于测试或占位）。
    fn default() -> Self {
        Self {
            user_id: "".to_string(),
            user_name: "".to_string(),
            role: Role::User,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_role_defaults_to_user() {
        assert_eq!(Role::parse("Admin"), Role::Admin);
        assert_eq!(Role::parse("User"), Role::User);
        assert_eq!(Role::parse("operator"), Role::User);
    }
}
