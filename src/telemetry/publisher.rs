//! Broker connection lifecycle and telemetry publishing.
//!
//! Wraps a rumqttc async client: readings arrive over an mpsc channel,
//! get rendered to their JSON payload, and are published at QoS 0 to the
//! station topic. Connection loss is handled by a fixed-delay retry that
//! runs until the broker comes back; the wait happens inline, so readings
//! queue up behind it and drain afterwards.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Local};
use rumqttc::{AsyncClient, Event as MqttEvent, MqttOptions, Packet, QoS};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::message::TelemetryMessage;
use super::reading::MachineReading;
use crate::config::BridgeConfig;

const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Connection and throughput status, published over a watch channel.
#[derive(Clone, Debug, Default)]
pub struct PublisherStatus {
    pub connection_state: ConnectionState,
    pub messages_sent: usize,
    pub last_error: Option<String>,
    pub last_activity: Option<DateTime<Local>>,
}

/// Everything the publisher needs to know, extracted from the bridge config.
#[derive(Clone, Debug)]
pub struct PublisherSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub topic: String,
    /// Username/password pair; `None` connects anonymously
    pub credentials: Option<(String, String)>,
    pub keep_alive: Duration,
    pub reconnect_delay: Duration,
}

impl From<&BridgeConfig> for PublisherSettings {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            host: config.broker.host.clone(),
            port: config.broker.port,
            client_id: config.station.client_id.clone(),
            topic: config.telemetry_topic(),
            credentials: config
                .broker
                .username
                .clone()
                .zip(config.broker.password.clone()),
            keep_alive: Duration::from_secs(config.broker.keep_alive_secs),
            reconnect_delay: Duration::from_secs(config.sampling.reconnect_delay_secs),
        }
    }
}

/// Fixed-delay reconnect policy.
///
/// Every attempt waits the same interval: no backoff, no attempt limit,
/// no distinction between failure causes.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay_for(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Uniform failure transition: record the error, mark the connection as
/// reconnecting, and return how long to wait before the next attempt.
fn on_poll_error<E: fmt::Display>(
    status: &mut PublisherStatus,
    policy: &ReconnectPolicy,
    attempt: u32,
    error: &E,
) -> Duration {
    status.connection_state = ConnectionState::Reconnecting;
    status.last_error = Some(error.to_string());
    policy.delay_for(attempt)
}

/// The publishing task: owns the MQTT client and its event loop.
pub struct TelemetryPublisher {
    client: AsyncClient,
    eventloop: rumqttc::EventLoop,
    settings: PublisherSettings,
    status: PublisherStatus,
    policy: ReconnectPolicy,
    status_sender: watch::Sender<PublisherStatus>,
}

impl TelemetryPublisher {
    pub fn new(settings: PublisherSettings, status_sender: watch::Sender<PublisherStatus>) -> Self {
        let mut mqtt_options = MqttOptions::new(
            settings.client_id.clone(),
            settings.host.clone(),
            settings.port,
        );
        mqtt_options.set_keep_alive(settings.keep_alive);
        if let Some((username, password)) = &settings.credentials {
            mqtt_options.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = AsyncClient::new(mqtt_options, 100);
        let policy = ReconnectPolicy::new(settings.reconnect_delay);

        let status = PublisherStatus {
            connection_state: ConnectionState::Connecting,
            ..Default::default()
        };

        TelemetryPublisher {
            client,
            eventloop,
            settings,
            status,
            policy,
            status_sender,
        }
    }

    /// Runs until shutdown, servicing the MQTT event loop and publishing
    /// every reading that arrives.
    pub async fn run(
        mut self,
        mut readings: mpsc::Receiver<MachineReading>,
        shutdown: CancellationToken,
    ) {
        info!(
            "Connecting to MQTT broker at {}:{} as '{}'",
            self.settings.host, self.settings.port, self.settings.client_id
        );
        self.publish_status();

        let mut attempt: u32 = 0;
        let mut sent_at_last_stats = 0usize;
        let mut stats_ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + STATS_INTERVAL,
            STATS_INTERVAL,
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Telemetry publisher shutting down");
                    if let Err(e) = self.client.disconnect().await {
                        debug!("Disconnect on shutdown failed: {}", e);
                    }
                    return;
                }
                maybe_reading = readings.recv() => {
                    match maybe_reading {
                        Some(reading) => self.publish_reading(reading),
                        None => {
                            warn!("Reading channel closed, stopping publisher");
                            return;
                        }
                    }
                }
                event = self.eventloop.poll() => {
                    match event {
                        Ok(MqttEvent::Incoming(Packet::ConnAck(_))) => {
                            attempt = 0;
                            self.status.connection_state = ConnectionState::Connected;
                            self.status.last_error = None;
                            self.publish_status();
                            info!(
                                "Connected to MQTT broker at {}:{}",
                                self.settings.host, self.settings.port
                            );
                        }
                        Ok(event) => debug!("MQTT event: {:?}", event),
                        Err(e) => {
                            attempt = attempt.wrapping_add(1);
                            let delay = on_poll_error(&mut self.status, &self.policy, attempt, &e);
                            self.publish_status();
                            warn!("MQTT connection failed: {}, retrying in {:?}", e, delay);
                            // Waits inline: readings queue in the channel
                            // until the broker is reachable again.
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
                _ = stats_ticker.tick() => {
                    let sent = self.status.messages_sent;
                    info!(
                        "Telemetry stats: {} published in the last {}s ({} total), state: {:?}",
                        sent - sent_at_last_stats,
                        STATS_INTERVAL.as_secs(),
                        sent,
                        self.status.connection_state
                    );
                    sent_at_last_stats = sent;
                }
            }
        }
    }

    /// Publishes one reading. Failures are logged and the reading is
    /// dropped; the loop itself never stops over a publish error.
    ///
    /// The publish must not block: the same task services the event loop
    /// that reconnects us, so a full request queue drops the reading.
    fn publish_reading(&mut self, reading: MachineReading) {
        let message = match TelemetryMessage::from_reading(&self.settings.topic, &reading) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to render reading, dropping it: {}", e);
                return;
            }
        };

        match self.client.try_publish(
            message.topic().to_owned(),
            QoS::AtMostOnce,
            false,
            message.payload().to_owned(),
        ) {
            Ok(()) => {
                self.status.messages_sent += 1;
                self.status.last_activity = Some(Local::now());
                info!("Published telemetry: {}", message);
                debug!("Full message:\n{}", message.render());
            }
            Err(e) => {
                warn!("Publish failed, dropping reading: {}", e);
                self.status.last_error = Some(e.to_string());
            }
        }
        self.publish_status();
    }

    fn publish_status(&self) {
        let _ = self.status_sender.send(self.status.clone());
    }
}

/// Handle for the publisher task, exposing its live status.
pub struct PublisherHandle {
    status_receiver: watch::Receiver<PublisherStatus>,
}

impl PublisherHandle {
    pub fn spawn(
        settings: PublisherSettings,
        readings: mpsc::Receiver<MachineReading>,
        shutdown: CancellationToken,
    ) -> Self {
        info!("Spawning Telemetry Publisher for topic '{}'", settings.topic);

        let (status_sender, status_receiver) = watch::channel(PublisherStatus::default());
        let publisher = TelemetryPublisher::new(settings, status_sender);

        tokio::spawn(async move {
            publisher.run(readings, shutdown).await;
            info!("Telemetry Publisher task finished");
        });

        Self { status_receiver }
    }

    /// Most recent status snapshot.
    pub fn status(&self) -> PublisherStatus {
        self.status_receiver.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;

    #[test]
    fn reconnect_delay_is_fixed_across_attempts() {
        let policy = ReconnectPolicy::new(Duration::from_secs(5));
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1), Duration::from_secs(5));
        assert_eq!(policy.delay_for(1_000_000), Duration::from_secs(5));
    }

    #[test]
    fn poll_errors_always_lead_back_to_reconnecting() {
        let policy = ReconnectPolicy::new(Duration::from_secs(5));
        let mut status = PublisherStatus::default();

        // Every failure is treated identically, for as many attempts as
        // it takes; there is no terminal state.
        for attempt in 0..10_000u32 {
            let delay = on_poll_error(&mut status, &policy, attempt, &"connection refused");
            assert_eq!(delay, Duration::from_secs(5));
            assert_eq!(status.connection_state, ConnectionState::Reconnecting);
            assert_eq!(status.last_error.as_deref(), Some("connection refused"));
        }
    }

    #[test]
    fn settings_derive_from_config() {
        let config = BridgeConfig::default();
        let settings = PublisherSettings::from(&config);
        assert_eq!(settings.host, "192.168.1.100");
        assert_eq!(settings.port, 1883);
        assert_eq!(settings.topic, "maquinas/estacion_2/datos");
        assert_eq!(settings.keep_alive, Duration::from_secs(5));
        assert_eq!(settings.reconnect_delay, Duration::from_secs(5));
        assert!(settings.credentials.is_none());
    }

    #[test]
    fn credentials_require_both_username_and_password() {
        let mut config = BridgeConfig::default();
        config.broker.username = Some("telemetria".to_string());
        assert!(PublisherSettings::from(&config).credentials.is_none());

        config.broker.password = Some("secreto".to_string());
        let settings = PublisherSettings::from(&config);
        assert_eq!(
            settings.credentials,
            Some(("telemetria".to_string(), "secreto".to_string()))
        );
    }
}
