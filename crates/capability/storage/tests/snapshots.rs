use chrono::Utc;
use smsgw_storage::{DeviceComSnapshotRecord, InMemorySnapshotStore, SnapshotStore};

fn snapshot(device_id: &str, data_json: &str) -> DeviceComSnapshotRecord {
    DeviceComSnapshotRecord {
        device_id: device_id.to_string(),
        data_json: data_json.to_string(),
        updated_time: Utc::now(),
    }
}

/// 不变量 2：覆盖写入后每个 device_id 至多一条，内容等于最后一次输入。
#[tokio::test]
async fn upsert_is_overwrite() {
    let store = InMemorySnapshotStore::new();
    store
        .upsert_snapshot(snapshot("D1", r#"[{"portName":"COM3"}]"#))
        .await
        .expect("upsert");
    store
        .upsert_snapshot(snapshot("D1", r#"[{"portName":"COM3"},{"portName":"COM5"}]"#))
        .await
        .expect("upsert");

    let found = store
        .find_snapshot("D1")
        .await
        .expect("find")
        .expect("snapshot exists");
    assert!(found.data_json.contains("COM5"));

    assert!(store.find_snapshot("D2").await.expect("find").is_none());
}
