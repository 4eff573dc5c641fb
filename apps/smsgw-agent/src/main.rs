//! 边缘 Agent 入口：驱动本机串口 GSM 猫，桥接到服务端集线器。

mod client;
mod driver;

use driver::AgentDriver;
use smsgw_config::AgentConfig;
use smsgw_modem::SystemSerial;
use smsgw_telemetry::init_tracing;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = AgentConfig::from_env()?;
    init_tracing();
    info!(device_id = %config.device_id, server = %config.server_url, "smsgw agent starting");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let driver = AgentDriver::new(&config, Arc::new(SystemSerial), events_tx);

    let client_driver = driver.clone();
    let server_url = config.server_url.clone();
    let client = tokio::spawn(async move {
        client::run(server_url, client_driver, events_rx).await;
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    client.abort();
    let shutdown_driver = driver.clone();
    tokio::task::spawn_blocking(move || shutdown_driver.shutdown()).await?;
    Ok(())
}
