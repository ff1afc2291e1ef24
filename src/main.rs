pub mod config;
pub mod sensors;
pub mod telemetry;

use color_eyre::eyre::{eyre, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::BridgeConfig;
use crate::sensors::{SamplerHandle, SamplerSettings};
use crate::telemetry::{PublisherHandle, PublisherSettings};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    info!("Starting station telemetry bridge");
    let config = setup_config().await?;
    info!(
        "Reporting for station '{}' to broker {}:{}",
        config.station.name, config.broker.host, config.broker.port
    );

    let (reading_sender, reading_receiver) = mpsc::channel(100);
    let shutdown = CancellationToken::new();

    let sampler_settings = SamplerSettings {
        publish_interval_secs: config.sampling.publish_interval_secs,
    };
    let _sampler_handle = SamplerHandle::spawn(
        &config.pins,
        Some(sampler_settings),
        reading_sender,
        shutdown.child_token(),
    )
    .map_err(|e| eyre!("Failed to spawn sensor sampler: {}", e))?;

    let publisher_handle = PublisherHandle::spawn(
        PublisherSettings::from(&config),
        reading_receiver,
        shutdown.child_token(),
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to listen for shutdown signal: {}", e))?;
    info!("Shutdown requested");
    shutdown.cancel();

    // Give the tasks a moment to disconnect from the broker.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let status = publisher_handle.status();
    info!(
        "Bridge stopped after {} published messages",
        status.messages_sent
    );
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

async fn setup_config() -> Result<BridgeConfig> {
    // Make sure a default configuration exists on first start
    BridgeConfig::ensure_default().await?;

    let config = BridgeConfig::load().await?;
    config.validate()?;
    Ok(config)
}
