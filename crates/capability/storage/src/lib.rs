//! 存储能力：模型、可见性范围、接口 trait 与三套实现
//! （内存 / Postgres / Redis 刷新 token）。

mod connection;
mod error;
mod in_memory;
mod models;
mod postgres;
mod redis;
mod scope;
mod traits;

pub use connection::connect_pool;
pub use error::StorageError;
pub use in_memory::{
    InMemoryCallHangupStore, InMemoryComAllocationStore, InMemoryNoteStore,
    InMemoryReadReceiptStore, InMemoryRefreshTokenStore, InMemorySendRecordStore,
    InMemorySmsMessageStore, InMemorySnapshotStore, InMemoryUserStore,
};
pub use models::{
    CallHangupRecord, ComAllocationRecord, ComAllocationUpdate, DeviceComSnapshotRecord,
    MessageReadReceiptRecord, MessageType, NoteRecord, NoteUpdate, ReceiptWriteResult,
    SmsMessageRecord, SmsSendRecord, UserRecord, UserUpdate,
};
pub use postgres::{
    PgCallHangupStore, PgComAllocationStore, PgNoteStore, PgReadReceiptStore, PgSendRecordStore,
    PgSmsMessageStore, PgSnapshotStore, PgUserStore,
};
pub use self::redis::RedisRefreshTokenStore;
pub use scope::{
    AccessScope, CallHangupQuery, Page, PageRequest, SmsMessageQuery, normalize,
};
pub use traits::{
    CallHangupStore, ComAllocationStore, NoteStore, ReadReceiptStore, RefreshTokenStore,
    SendRecordStore, SmsMessageStore, SnapshotStore, UserStore,
};
