use anyhow::Context;
use edge_node::adapter;
use edge_node::config::{AdapterConfig, EdgeConfig};
use edge_node::device::DeviceSupervisor;
use edge_node::transport::MqttTransport;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = EdgeConfig::from_env();
    let adapter_config = AdapterConfig::from_env();

    // RUST_LOG wins over LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    info!("Edge node starting: {}", config.edge_uuid);
    info!("  MQTT broker: {}:{}", config.mqtt_host, config.mqtt_port);
    info!("  Adapter: {:?}", adapter_config.adapter_type);

    let transport = Arc::new(MqttTransport::from_edge_config(&config));
    let supervisor = Arc::new(DeviceSupervisor::new(
        config,
        adapter_config,
        transport,
        Box::new(adapter::create_adapter),
    ));

    let signal_target = supervisor.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                signal_target.core().request_shutdown();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    supervisor.run().await.context("edge node stopped with an error")
}
