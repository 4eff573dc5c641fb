//! 请求级可见性范围构造。
//!
//! 管理员直接得到全量范围（includeDeleted 仅对管理员生效）；普通用户
//! 加载其全部未删除 COM 分配并归一化为 AccessScope，分配为空时后续
//! 查询自然得到空页（授权失败不是错误）。

use crate::AppState;
use crate::utils::response::storage_error;
use axum::response::Response;
use domain::AuthContext;
use smsgw_storage::AccessScope;

/// 为当前用户构造查询范围。
pub async fn scope_for(
    state: &AppState,
    ctx: &AuthContext,
    include_deleted: bool,
) -> Result<AccessScope, Response> {
    if ctx.is_admin() {
        return Ok(AccessScope::admin(include_deleted));
    }
    let allocations = state
        .allocation_store
        .list_for_user(&ctx.user_id)
        .await
        .map_err(storage_error)?;
    Ok(AccessScope::from_allocations(&allocations))
}
