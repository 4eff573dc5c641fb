//! 存储接口 Trait 定义
//!
//! 定义所有资源存储的异步接口：
//! - UserStore：用户存储
//! - ComAllocationStore：COM 分配存储
//! - SnapshotStore：设备快照存储（覆盖语义）
//! - SmsMessageStore：短信存储
//! - CallHangupStore：挂断记录存储
//! - ReadReceiptStore：已读回执存储（幂等写入）
//! - SendRecordStore：发送记录存储
//! - NoteStore：备注存储
//! - RefreshTokenStore：刷新 token 存储
//!
//! 设计原则：
//! - 列表接口显式接收 AccessScope，可见性在存储层强制执行
//! - 所有接口返回 StorageError
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use crate::models::{
    CallHangupRecord, ComAllocationRecord, ComAllocationUpdate, DeviceComSnapshotRecord,
    MessageType, NoteRecord, NoteUpdate, ReceiptWriteResult, SmsMessageRecord, SmsSendRecord,
    UserRecord, UserUpdate,
};
use crate::scope::{AccessScope, CallHangupQuery, Page, PageRequest, SmsMessageQuery};
use async_trait::async_trait;
use std::collections::HashSet;

/// 用户存储接口。默认查询不含软删除用户。
#[async_trait]
pub trait UserStore: Send + Sync {
    /// 根据用户名查找用户。
    async fn find_by_user_name(&self, user_name: &str)
    -> Result<Option<UserRecord>, StorageError>;

    /// 根据 ID 查找用户。
    async fn find_by_id(&self, id: &str) -> Result<Option<UserRecord>, StorageError>;

    /// 列出全部未删除用户。
    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError>;

    /// 创建用户。用户名重复返回冲突错误。
    async fn create_user(&self, record: UserRecord) -> Result<UserRecord, StorageError>;

    /// 更新用户（口令散列/角色）。
    async fn update_user(
        &self,
        id: &str,
        update: UserUpdate,
    ) -> Result<Option<UserRecord>, StorageError>;

    /// 软删除用户。
    async fn delete_user(&self, id: &str) -> Result<bool, StorageError>;
}

/// COM 分配存储接口。
#[async_trait]
pub trait ComAllocationStore: Send + Sync {
    /// 列出某用户的全部未删除分配（可见性计算入口）。
    async fn list_for_user(&self, user_id: &str)
    -> Result<Vec<ComAllocationRecord>, StorageError>;

    /// 列出全部未删除分配（管理面）。
    async fn list_all(&self) -> Result<Vec<ComAllocationRecord>, StorageError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<ComAllocationRecord>, StorageError>;

    async fn create_allocation(
        &self,
        record: ComAllocationRecord,
    ) -> Result<ComAllocationRecord, StorageError>;

    async fn update_allocation(
        &self,
        id: &str,
        update: ComAllocationUpdate,
    ) -> Result<Option<ComAllocationRecord>, StorageError>;

    /// 软删除分配。
    async fn delete_allocation(&self, id: &str) -> Result<bool, StorageError>;
}

/// 设备快照存储接口。
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// 覆盖写入：同一 device_id 至多保留一条（逻辑上先删后插）。
    async fn upsert_snapshot(
        &self,
        record: DeviceComSnapshotRecord,
    ) -> Result<DeviceComSnapshotRecord, StorageError>;

    async fn find_snapshot(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceComSnapshotRecord>, StorageError>;
}

/// 短信存储接口。
#[async_trait]
pub trait SmsMessageStore: Send + Sync {
    /// 追加一条短信（入库先于广播）。
    async fn insert_message(
        &self,
        record: SmsMessageRecord,
    ) -> Result<SmsMessageRecord, StorageError>;

    /// 可见范围内的分页查询，按 received_time 降序。
    async fn query_messages(
        &self,
        scope: &AccessScope,
        query: &SmsMessageQuery,
        page: PageRequest,
    ) -> Result<Page<SmsMessageRecord>, StorageError>;

    /// 可见范围内（可再按设备/端口过滤）的全部 ID，未读数与批量已读用。
    async fn visible_message_ids(
        &self,
        scope: &AccessScope,
        device_id: Option<&str>,
        com_port: Option<&str>,
    ) -> Result<Vec<String>, StorageError>;

    async fn soft_delete_message(&self, id: &str) -> Result<bool, StorageError>;

    async fn hard_delete_message(&self, id: &str) -> Result<bool, StorageError>;
}

/// 挂断记录存储接口。
#[async_trait]
pub trait CallHangupStore: Send + Sync {
    async fn insert_record(
        &self,
        record: CallHangupRecord,
    ) -> Result<CallHangupRecord, StorageError>;

    /// 可见范围内的分页查询，按 hangup_time 降序。
    async fn query_records(
        &self,
        scope: &AccessScope,
        query: &CallHangupQuery,
        page: PageRequest,
    ) -> Result<Page<CallHangupRecord>, StorageError>;

    async fn visible_record_ids(
        &self,
        scope: &AccessScope,
        device_id: Option<&str>,
        com_port: Option<&str>,
    ) -> Result<Vec<String>, StorageError>;

    async fn soft_delete_record(&self, id: &str) -> Result<bool, StorageError>;

    async fn hard_delete_record(&self, id: &str) -> Result<bool, StorageError>;
}

/// 已读回执存储接口。
///
/// (user_id, message_type, source_id) 唯一；重复写入静默成功。
#[async_trait]
pub trait ReadReceiptStore: Send + Sync {
    /// 标记单条已读。重复标记返回 inserted=false。
    async fn mark_read(
        &self,
        user_id: &str,
        message_type: MessageType,
        source_id: &str,
    ) -> Result<ReceiptWriteResult, StorageError>;

    /// 批量补写回执：跳过已存在的，原子插入其余，返回新插入条数。
    async fn insert_missing(
        &self,
        user_id: &str,
        message_type: MessageType,
        source_ids: &[String],
    ) -> Result<u64, StorageError>;

    /// 给定 ID 集合中已读的子集（列表页 isRead 富化与未读数计算用）。
    async fn read_source_ids(
        &self,
        user_id: &str,
        message_type: MessageType,
        source_ids: &[String],
    ) -> Result<HashSet<String>, StorageError>;
}

/// 发送记录存储接口。
#[async_trait]
pub trait SendRecordStore: Send + Sync {
    async fn create_record(&self, record: SmsSendRecord) -> Result<SmsSendRecord, StorageError>;

    async fn find_record(&self, id: &str) -> Result<Option<SmsSendRecord>, StorageError>;

    /// 依据 Agent 回执更新状态（Pending → Success/Failed）。
    async fn update_status(
        &self,
        id: &str,
        status: &str,
        error_message: Option<&str>,
    ) -> Result<Option<SmsSendRecord>, StorageError>;
}

/// 备注存储接口（按用户隔离）。
#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn list_notes(&self, user_id: &str) -> Result<Vec<NoteRecord>, StorageError>;

    async fn find_note(&self, user_id: &str, id: &str)
    -> Result<Option<NoteRecord>, StorageError>;

    async fn create_note(&self, record: NoteRecord) -> Result<NoteRecord, StorageError>;

    async fn update_note(
        &self,
        user_id: &str,
        id: &str,
        update: NoteUpdate,
    ) -> Result<Option<NoteRecord>, StorageError>;

    /// 软删除备注。
    async fn delete_note(&self, user_id: &str, id: &str) -> Result<bool, StorageError>;
}

/// 刷新 token 存储接口（按 jti 一次性使用）。
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// 记录 jti → user_id，带 TTL。
    async fn store(&self, jti: &str, user_id: &str, ttl_seconds: u64)
    -> Result<(), StorageError>;

    /// 取出并删除（旋转语义）。不存在返回 None。
    async fn take(&self, jti: &str) -> Result<Option<String>, StorageError>;

    /// 主动吊销。
    async fn revoke(&self, jti: &str) -> Result<(), StorageError>;
}
