use chrono::{Duration, Utc};
use smsgw_storage::{
    AccessScope, CallHangupQuery, CallHangupRecord, CallHangupStore, ComAllocationRecord,
    InMemoryCallHangupStore, InMemorySmsMessageStore, PageRequest, SmsMessageQuery,
    SmsMessageRecord, SmsMessageStore,
};

fn allocation(id: &str, user_id: &str, device_id: &str, ports: &[&str]) -> ComAllocationRecord {
    ComAllocationRecord {
        id: id.to_string(),
        user_id: user_id.to_string(),
        device_id: device_id.to_string(),
        com_ports: ports.iter().map(|port| port.to_string()).collect(),
        is_deleted: false,
        create_time: Utc::now(),
        update_time: Utc::now(),
    }
}

fn sms(id: &str, device_id: &str, com_port: &str, minutes_ago: i64) -> SmsMessageRecord {
    SmsMessageRecord {
        id: id.to_string(),
        device_id: device_id.to_string(),
        com_port: com_port.to_string(),
        sender_number: "+15551234567".to_string(),
        message_content: "hello".to_string(),
        received_time: Utc::now() - Duration::minutes(minutes_ago),
        sms_timestamp: None,
        operator: None,
        is_deleted: false,
    }
}

fn hangup(id: &str, device_id: &str, com_port: &str) -> CallHangupRecord {
    CallHangupRecord {
        id: id.to_string(),
        device_id: device_id.to_string(),
        com_port: com_port.to_string(),
        caller_number: Some("+16660002222".to_string()),
        hangup_time: Utc::now(),
        reason: "AutoHangup".to_string(),
        raw_line: None,
        is_deleted: false,
    }
}

/// Alice 的分配为 (D1, [COM3,COM5]) 与 (D2, [COM7])。
/// 可见行仅 (D1,COM3) 与 (D2,COM7)：(D1,COM4) 设备匹配但端口不在并集内，
/// (D3,COM3) 端口匹配但设备不在分配内。
#[tokio::test]
async fn sms_visibility_requires_device_and_port() {
    let store = InMemorySmsMessageStore::new();
    for record in [
        sms("m1", "D1", "COM3", 1),
        sms("m2", "D1", "COM4", 2),
        sms("m3", "D2", "COM7", 3),
        sms("m4", "D3", "COM3", 4),
    ] {
        store.insert_message(record).await.expect("insert");
    }

    let scope = AccessScope::from_allocations(&[
        allocation("a1", "alice", "D1", &["COM3", "COM5"]),
        allocation("a2", "alice", "D2", &["COM7"]),
    ]);
    let page = store
        .query_messages(&scope, &SmsMessageQuery::default(), PageRequest::default())
        .await
        .expect("query");
    let ids: Vec<&str> = page.data.iter().map(|item| item.id.as_str()).collect();
    assert_eq!(ids, vec!["m1", "m3"]);
    assert_eq!(page.total_count, 2);
}

/// 挂断记录的可见性要求设备与端口同时落在分配范围内。
#[tokio::test]
async fn hangup_visibility_requires_device_and_port() {
    let store = InMemoryCallHangupStore::new();
    for record in [
        hangup("h1", "D1", "COM3"),
        hangup("h2", "D1", "COM4"),
        hangup("h3", "D2", "COM7"),
        hangup("h4", "D3", "COM3"),
    ] {
        store.insert_record(record).await.expect("insert");
    }

    let scope = AccessScope::from_allocations(&[
        allocation("a1", "alice", "D1", &["COM3", "COM5"]),
        allocation("a2", "alice", "D2", &["COM7"]),
    ]);
    let page = store
        .query_records(&scope, &CallHangupQuery::default(), PageRequest::default())
        .await
        .expect("query");
    let mut ids: Vec<&str> = page.data.iter().map(|item| item.id.as_str()).collect();
    ids.sort();
    // h2 设备匹配但端口不在并集内；h4 端口匹配但设备不在分配内
    assert_eq!(ids, vec!["h1", "h3"]);
}

/// 不变量 3：分配为空的用户无论携带什么过滤条件都得到空页。
#[tokio::test]
async fn empty_allocations_yield_empty_page() {
    let store = InMemorySmsMessageStore::new();
    store
        .insert_message(sms("m1", "D1", "COM3", 1))
        .await
        .expect("insert");

    let scope = AccessScope::from_allocations(&[]);
    let query = SmsMessageQuery {
        device_id: Some("D1".to_string()),
        com_port: Some("COM3".to_string()),
        ..Default::default()
    };
    let page = store
        .query_messages(&scope, &query, PageRequest::new(Some(1), Some(50)))
        .await
        .expect("query");
    assert_eq!(page.total_count, 0);
    assert!(page.data.is_empty());
}

/// 过滤条件在可见性之后生效，归一化为大小写不敏感的精确匹配。
#[tokio::test]
async fn filters_apply_after_visibility() {
    let store = InMemorySmsMessageStore::new();
    for record in [
        sms("m1", "D1", "COM3", 1),
        sms("m2", "D1", "COM5", 2),
    ] {
        store.insert_message(record).await.expect("insert");
    }
    let scope = AccessScope::from_allocations(&[allocation("a1", "alice", "D1", &["COM3", "COM5"])]);
    let query = SmsMessageQuery {
        com_port: Some(" com5 ".to_string()),
        ..Default::default()
    };
    let page = store
        .query_messages(&scope, &query, PageRequest::default())
        .await
        .expect("query");
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.data[0].id, "m2");
}

/// 管理员默认不包含软删除行，include_deleted 才放开。
#[tokio::test]
async fn admin_soft_delete_visibility() {
    let store = InMemorySmsMessageStore::new();
    store
        .insert_message(sms("m1", "D1", "COM3", 1))
        .await
        .expect("insert");
    store
        .insert_message(sms("m2", "D1", "COM3", 2))
        .await
        .expect("insert");
    assert!(store.soft_delete_message("m2").await.expect("delete"));

    let page = store
        .query_messages(
            &AccessScope::admin(false),
            &SmsMessageQuery::default(),
            PageRequest::default(),
        )
        .await
        .expect("query");
    assert_eq!(page.total_count, 1);

    let page = store
        .query_messages(
            &AccessScope::admin(true),
            &SmsMessageQuery::default(),
            PageRequest::default(),
        )
        .await
        .expect("query");
    assert_eq!(page.total_count, 2);
}

/// 分页：received_time 降序，pageSize 截断。
#[tokio::test]
async fn pagination_orders_by_received_time_desc() {
    let store = InMemorySmsMessageStore::new();
    for index in 0..5 {
        store
            .insert_message(sms(&format!("m{index}"), "D1", "COM3", index))
            .await
            .expect("insert");
    }
    let page = store
        .query_messages(
            &AccessScope::admin(false),
            &SmsMessageQuery::default(),
            PageRequest::new(Some(2), Some(2)),
        )
        .await
        .expect("query");
    assert_eq!(page.total_count, 5);
    let ids: Vec<&str> = page.data.iter().map(|item| item.id.as_str()).collect();
    // m0 最新，第二页（每页 2 条）应为 m2、m3
    assert_eq!(ids, vec!["m2", "m3"]);
}
