use chrono::{Duration, Utc};
use smsgw_storage::{
    AccessScope, ComAllocationRecord, InMemoryReadReceiptStore, InMemorySmsMessageStore,
    MessageType, ReadReceiptStore, SmsMessageRecord, SmsMessageStore,
};

fn sms(id: &str, device_id: &str, com_port: &str, minutes_ago: i64) -> SmsMessageRecord {
    SmsMessageRecord {
        id: id.to_string(),
        device_id: device_id.to_string(),
        com_port: com_port.to_string(),
        sender_number: "+15550001111".to_string(),
        message_content: "hello".to_string(),
        received_time: Utc::now() - Duration::minutes(minutes_ago),
        sms_timestamp: None,
        operator: None,
        is_deleted: false,
    }
}

fn allocation(device_id: &str, ports: &[&str]) -> ComAllocationRecord {
    ComAllocationRecord {
        id: "a-1".to_string(),
        user_id: "alice".to_string(),
        device_id: device_id.to_string(),
        com_ports: ports.iter().map(|port| port.to_string()).collect(),
        is_deleted: false,
        create_time: Utc::now(),
        update_time: Utc::now(),
    }
}

/// 不变量 1：同一 (user, type, sourceId) 标记一次或 N 次，只存在一条回执。
#[tokio::test]
async fn mark_read_is_idempotent() {
    let receipts = InMemoryReadReceiptStore::new();
    let first = receipts
        .mark_read("alice", MessageType::Sms, "m1")
        .await
        .expect("mark");
    assert!(first.inserted);
    for _ in 0..5 {
        let again = receipts
            .mark_read("alice", MessageType::Sms, "m1")
            .await
            .expect("mark");
        assert!(!again.inserted);
    }
    let read = receipts
        .read_source_ids("alice", MessageType::Sms, &["m1".to_string()])
        .await
        .expect("read set");
    assert_eq!(read.len(), 1);
}

/// 并发重复标记仍只得一行（内存实现依赖同一把写锁，语义与唯一索引一致）。
#[tokio::test]
async fn concurrent_mark_read_single_row() {
    let receipts = std::sync::Arc::new(InMemoryReadReceiptStore::new());
    let mut handles = Vec::new();
    for _ in 0..8 {
        let receipts = receipts.clone();
        handles.push(tokio::spawn(async move {
            receipts
                .mark_read("alice", MessageType::Hangup, "h1")
                .await
                .expect("mark")
                .inserted
        }));
    }
    let mut inserted_count = 0;
    for handle in handles {
        if handle.await.expect("join") {
            inserted_count += 1;
        }
    }
    assert_eq!(inserted_count, 1);
}

/// 场景 S6：5 条可见短信，标记 2 条后未读为 3；按 COM3 批量标记后，
/// 未读数等于不在 COM3 上的可见短信数。
#[tokio::test]
async fn unread_counts_are_set_difference() {
    let messages = InMemorySmsMessageStore::new();
    let receipts = InMemoryReadReceiptStore::new();
    for record in [
        sms("m1", "D1", "COM3", 1),
        sms("m2", "D1", "COM3", 2),
        sms("m3", "D1", "COM3", 3),
        sms("m4", "D1", "COM5", 4),
        sms("m5", "D1", "COM5", 5),
    ] {
        messages.insert_message(record).await.expect("insert");
    }
    let scope = AccessScope::from_allocations(&[allocation("D1", &["COM3", "COM5"])]);

    let visible = messages
        .visible_message_ids(&scope, None, None)
        .await
        .expect("visible");
    assert_eq!(visible.len(), 5);

    receipts
        .mark_read("alice", MessageType::Sms, "m1")
        .await
        .expect("mark");
    receipts
        .mark_read("alice", MessageType::Sms, "m4")
        .await
        .expect("mark");
    let read = receipts
        .read_source_ids("alice", MessageType::Sms, &visible)
        .await
        .expect("read set");
    assert_eq!(visible.len() - read.len(), 3);

    // mark-all-read 限定 COM3
    let com3_ids = messages
        .visible_message_ids(&scope, None, Some("COM3"))
        .await
        .expect("visible com3");
    let inserted = receipts
        .insert_missing("alice", MessageType::Sms, &com3_ids)
        .await
        .expect("bulk insert");
    // m1 已读，新增 m2、m3
    assert_eq!(inserted, 2);

    let read = receipts
        .read_source_ids("alice", MessageType::Sms, &visible)
        .await
        .expect("read set");
    let unread = visible.len() - read.len();
    // 剩余未读 = 不在 COM3 上且未标记的 m5
    assert_eq!(unread, 1);
}

/// 回执按消息类型隔离：Sms 的回执不影响 Hangup 的未读集合。
#[tokio::test]
async fn receipts_are_scoped_by_message_type() {
    let receipts = InMemoryReadReceiptStore::new();
    receipts
        .mark_read("alice", MessageType::Sms, "x1")
        .await
        .expect("mark");
    let read = receipts
        .read_source_ids("alice", MessageType::Hangup, &["x1".to_string()])
        .await
        .expect("read set");
    assert!(read.is_empty());
}
