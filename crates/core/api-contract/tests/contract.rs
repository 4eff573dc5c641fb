use api_contract::hub::{AgentToServer, ServerToAgent, ServerToClient};
use api_contract::{ApiResponse, ModemInfoDto, PageResponse, PortInfoDto, SmsReceivedDto};
use chrono::{TimeZone, Utc};

#[test]
fn api_response_success_shape() {
    let response = ApiResponse::success(vec!["D1".to_string()]);
    let json = serde_json::to_value(&response).expect("serialize");
    assert_eq!(json["success"], true);
    assert_eq!(json["data"][0], "D1");
    assert!(json["error"].is_null());
}

#[test]
fn api_response_error_shape() {
    let response = ApiResponse::<()>::error(api_contract::error_codes::INVALID_REQUEST, "bad");
    let json = serde_json::to_value(&response).expect("serialize");
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "INVALID.REQUEST");
    assert_eq!(json["error"]["message"], "bad");
}

#[test]
fn page_response_uses_camel_case() {
    let page = PageResponse {
        total_count: 42,
        page_number: 2,
        page_size: 20,
        data: vec!["x"],
    };
    let json = serde_json::to_value(&page).expect("serialize");
    assert_eq!(json["totalCount"], 42);
    assert_eq!(json["pageNumber"], 2);
    assert_eq!(json["pageSize"], 20);
}

#[test]
fn port_info_round_trips_camel_case() {
    let port = PortInfoDto {
        device_id: "D1".to_string(),
        port_name: "COM3".to_string(),
        is_available: true,
        is_sms_modem: true,
        baud_rate: Some(115200),
        modem_info: Some(ModemInfoDto {
            has_sim_card: true,
            iccid: Some("89860000000000000000".to_string()),
            operator: Some("CMCC".to_string()),
            signal_strength: Some(24),
            signal_quality: Some("Good".to_string()),
            phone_number: None,
            manufacturer: Some("Quectel".to_string()),
            model: Some("EC20".to_string()),
            firmware: None,
            imei: Some("860000000000000".to_string()),
            sim_status: Some("READY".to_string()),
            network_status: Some("Registered Home".to_string()),
        }),
        raw: None,
    };
    let json = serde_json::to_value(&port).expect("serialize");
    assert_eq!(json["deviceId"], "D1");
    assert_eq!(json["isSmsModem"], true);
    assert_eq!(json["modemInfo"]["hasSimCard"], true);
    assert_eq!(json["modemInfo"]["signalQuality"], "Good");

    let back: PortInfoDto = serde_json::from_value(json).expect("deserialize");
    assert_eq!(back, port);
}

#[test]
fn hub_messages_are_type_tagged() {
    let message = AgentToServer::RegisterDevice {
        device_id: "agent-01".to_string(),
    };
    let json = serde_json::to_value(&message).expect("serialize");
    assert_eq!(json["type"], "RegisterDevice");
    assert_eq!(json["deviceId"], "agent-01");

    let command: ServerToAgent = serde_json::from_str(
        r#"{"type":"SendSms","deviceId":"agent-01","comPort":"COM5","targetNumber":"+15551234567","messageContent":"hi","recordId":"r-1"}"#,
    )
    .expect("deserialize");
    match command {
        ServerToAgent::SendSms {
            device_id,
            com_port,
            record_id,
            ..
        } => {
            assert_eq!(device_id, "agent-01");
            assert_eq!(com_port, "COM5");
            assert_eq!(record_id, "r-1");
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[test]
fn sms_received_event_serializes_utc() {
    let received_time = Utc.with_ymd_and_hms(2026, 1, 23, 14, 30, 45).unwrap();
    let event = AgentToServer::SendSmsReceived {
        device_id: "agent-01".to_string(),
        sms: SmsReceivedDto {
            device_id: "agent-01".to_string(),
            com_port: "COM3".to_string(),
            sender_number: "+8613800138000".to_string(),
            message_content: "你你".to_string(),
            received_time,
            sms_timestamp: Some("26/01/23,14:30:45+32".to_string()),
        },
    };
    let json = serde_json::to_value(&event).expect("serialize");
    assert_eq!(json["type"], "SendSmsReceived");
    assert_eq!(json["sms"]["comPort"], "COM3");
    assert_eq!(json["sms"]["senderNumber"], "+8613800138000");
    assert_eq!(json["sms"]["messageContent"], "你你");
    assert_eq!(json["sms"]["receivedTime"], "2026-01-23T14:30:45Z");
}

#[test]
fn unknown_client_broadcast_fails_to_parse() {
    let result = serde_json::from_str::<ServerToClient>(r#"{"type":"Nope"}"#);
    assert!(result.is_err());
}
