//! Postgres 存储实现
//!
//! 与内存实现遵循同一套 trait 语义。所有查询使用 sqlx 参数绑定，
//! 可见性条件直接编译进 SQL（空范围在进入 SQL 前短路为 空页）。

mod call_hangup;
mod com_allocation;
mod note;
mod read_receipt;
mod send_record;
mod sms_message;
mod snapshot;
mod user;

pub use call_hangup::PgCallHangupStore;
pub use com_allocation::PgComAllocationStore;
pub use note::PgNoteStore;
pub use read_receipt::PgReadReceiptStore;
pub use send_record::PgSendRecordStore;
pub use sms_message::PgSmsMessageStore;
pub use snapshot::PgSnapshotStore;
pub use user::PgUserStore;

use crate::scope::AccessScope;

/// 将可见性范围展开为 SQL 绑定值：(admin, device_ids, com_ports, include_deleted)。
pub(crate) fn scope_binds(scope: &AccessScope) -> (bool, Vec<String>, Vec<String>, bool) {
    match scope {
        AccessScope::Admin { include_deleted } => (true, Vec::new(), Vec::new(), *include_deleted),
        AccessScope::Allocated {
            device_ids,
            com_ports,
        } => (
            false,
            device_ids.iter().cloned().collect(),
            com_ports.iter().cloned().collect(),
            false,
        ),
    }
}

/// 模糊匹配参数归一化：空白串视为未提供。
pub(crate) fn contains_bind(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// 精确匹配参数归一化：trim + 大写。
pub(crate) fn exact_bind(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|value| crate::scope::normalize(value))
        .filter(|value| !value.is_empty())
}
