//! 集线器客户端：持久 WebSocket 连接 + 指数退避重连。
//!
//! 每次（重）连成功立即重发 `RegisterDevice`；断连期间驱动事件在
//! 无界队列中排队，恢复后按序送出。入站命令按目标设备匹配
//! （空串不限定），不匹配的命令忽略。

use crate::driver::AgentDriver;
use api_contract::hub::{AgentToServer, ServerToAgent};
use futures_util::{SinkExt, StreamExt};
use smsgw_modem::ListenPort;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// 运行客户端主循环（不返回）。
pub async fn run(
    server_url: String,
    driver: Arc<AgentDriver>,
    mut events_rx: UnboundedReceiver<AgentToServer>,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        info!(url = %server_url, "connecting to hub");
        match connect_async(&server_url).await {
            Ok((stream, _response)) => {
                info!("hub connected");
                backoff = INITIAL_BACKOFF;
                run_session(stream, &driver, &mut events_rx).await;
                warn!("hub connection lost");
            }
            Err(err) => {
                warn!(error = %err, "hub connect failed");
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

async fn run_session(
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    driver: &Arc<AgentDriver>,
    events_rx: &mut UnboundedReceiver<AgentToServer>,
) {
    let (mut sink, mut read) = stream.split();

    // 注册自身 DeviceId（重连后同样执行）
    let register = AgentToServer::RegisterDevice {
        device_id: driver.device_id().to_string(),
    };
    if send_message(&mut sink, &register).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            event = events_rx.recv() => {
                let Some(event) = event else { return };
                if send_message(&mut sink, &event).await.is_err() {
                    return;
                }
            }
            inbound = read.next() => {
                match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        match serde_json::from_str::<ServerToAgent>(&text) {
                            Ok(command) => dispatch(driver, command),
                            Err(err) => warn!(error = %err, "hub command parse failed"),
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => return,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(error = %err, "hub read error");
                        return;
                    }
                }
            }
        }
    }
}

async fn send_message<S>(sink: &mut S, message: &AgentToServer) -> Result<(), ()>
where
    S: SinkExt<WsMessage> + Unpin,
{
    let payload = match serde_json::to_string(message) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "event serialization failed");
            return Ok(());
        }
    };
    sink.send(WsMessage::Text(payload.into()))
        .await
        .map_err(|_| ())
}

/// 命令分发。目标不匹配的命令忽略。
fn dispatch(driver: &Arc<AgentDriver>, command: ServerToAgent) {
    match command {
        ServerToAgent::ScanComPorts { device_id } => {
            if !driver.matches(&device_id) {
                debug!(target = %device_id, "scan command for another device, ignored");
                return;
            }
            driver.run_scan();
        }
        ServerToAgent::StartSmsReceiver { device_id, ports } => {
            if !driver.matches(&device_id) {
                return;
            }
            let ports: Vec<ListenPort> = ports
                .into_iter()
                .map(|port| ListenPort {
                    port_name: port.port_name,
                    baud_rate: port.baud_rate,
                })
                .collect();
            driver.start_receiver(ports);
        }
        ServerToAgent::StopSmsReceiver { device_id } => {
            if !driver.matches(&device_id) {
                return;
            }
            driver.stop_receiver();
        }
        ServerToAgent::SendSms {
            device_id,
            com_port,
            target_number,
            message_content,
            record_id,
        } => {
            if !driver.matches(&device_id) {
                return;
            }
            driver.run_send(com_port, target_number, message_content, record_id);
        }
    }
}
