//! Bridge configuration management.
//!
//! Loads and persists the bridge configuration as a TOML file in the user's
//! config directory, generating a default file on first start so the bridge
//! can run unattended on a freshly imaged device. Defaults mirror the
//! station's as-built wiring and broker address.

use color_eyre::eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Top-level configuration for the station telemetry bridge.
///
/// ## Design Rationale
/// Configuration is organized into sections that map to the bridge's
/// subsystems: station identity, broker connection, pin wiring, and timing.
/// Each section is a strongly-typed struct with serde support so a corrupted
/// or missing file degrades to defaults instead of preventing startup.
///
/// ## Usage Context
/// Loaded once during startup, validated, and handed to the sampler and
/// publisher subsystems. Changes require a restart to take effect.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct BridgeConfig {
    /// Station identity (name used in the topic, MQTT client id)
    pub station: StationConfig,
    /// MQTT broker address and session parameters
    pub broker: BrokerConfig,
    /// GPIO and ADC wiring
    pub pins: PinConfig,
    /// Publish and reconnect timing
    pub sampling: SamplingConfig,
}

/// Identity of the machine station this bridge reports for.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct StationConfig {
    /// Station name, used as the middle segment of the telemetry topic
    pub name: String,
    /// Client id presented to the MQTT broker
    pub client_id: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            name: "estacion_2".to_string(),
            client_id: "StationBridge".to_string(),
        }
    }
}

/// MQTT broker connection settings.
///
/// Credentials are optional; when absent the bridge connects anonymously.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct BrokerConfig {
    /// Broker hostname or IP address
    pub host: String,
    /// Broker port (1883 for plain MQTT)
    pub port: u16,
    /// Optional username for broker authentication
    pub username: Option<String>,
    /// Optional password for broker authentication
    pub password: Option<String>,
    /// MQTT keep-alive interval in seconds
    pub keep_alive_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.100".to_string(),
            port: 1883,
            username: None,
            password: None,
            keep_alive_secs: 5,
        }
    }
}

/// Wiring of the sensor inputs, BCM pin numbering.
///
/// ## Usage Context
/// Consumed by the sensor sampler at startup to claim GPIO pins and the
/// ADC channel. Pin assignments must be pairwise distinct; `validate()`
/// rejects collisions before any hardware is touched.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct PinConfig {
    /// Digital input for the external motor contact
    pub motor_externo: u8,
    /// Digital input for the internal motor contact
    pub motor_interno: u8,
    /// Encoder channel A (interrupt source)
    pub encoder_a: u8,
    /// Encoder channel B (direction reference)
    pub encoder_b: u8,
    /// MCP3008 channel wired to the current sensor (0-7)
    pub current_channel: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            motor_externo: 22,
            motor_interno: 24,
            encoder_a: 2,
            encoder_b: 3,
            current_channel: 0,
        }
    }
}

/// Timing parameters for publishing and broker reconnection.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SamplingConfig {
    /// Interval between sensor samples / telemetry publishes, in seconds
    pub publish_interval_secs: u64,
    /// Fixed delay between broker reconnection attempts, in seconds
    pub reconnect_delay_secs: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            publish_interval_secs: 5,
            reconnect_delay_secs: 5,
        }
    }
}

impl BridgeConfig {
    /// Path of the configuration file inside the user's config directory.
    pub fn config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            warn!("Unable to determine config directory, falling back to current directory");
            PathBuf::from(".")
        });
        base.join("stationbridge").join("config.toml")
    }

    /// Writes a default configuration file if none exists yet.
    pub async fn ensure_default() -> Result<()> {
        let path = Self::config_path();

        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| eyre!("Failed to check config file {}: {}", path.display(), e))?
        {
            debug!("Configuration file already exists at {}", path.display());
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| eyre!("Failed to serialize default config: {}", e))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| eyre!("Failed to write default config file: {}", e))?;

        info!("Wrote default configuration to {}", path.display());
        Ok(())
    }

    /// Loads the configuration from the config file.
    pub async fn load() -> Result<Self> {
        let path = Self::config_path();
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config: Self =
            toml::from_str(&content).map_err(|e| eyre!("Failed to parse config file: {}", e))?;
        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Persists the configuration back to the config file.
    pub async fn save(&self) -> Result<()> {
        let path = Self::config_path();
        let content = toml::to_string_pretty(self)
            .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file {}: {}", path.display(), e))?;
        info!("Saved configuration to {}", path.display());
        Ok(())
    }

    /// Checks the configuration for wiring and timing mistakes.
    pub fn validate(&self) -> Result<()> {
        let gpio_pins = [
            ("motor_externo", self.pins.motor_externo),
            ("motor_interno", self.pins.motor_interno),
            ("encoder_a", self.pins.encoder_a),
            ("encoder_b", self.pins.encoder_b),
        ];

        for (i, (name_a, pin_a)) in gpio_pins.iter().enumerate() {
            for (name_b, pin_b) in gpio_pins.iter().skip(i + 1) {
                if pin_a == pin_b {
                    return Err(eyre!(
                        "Pin collision: {} and {} are both wired to GPIO {}",
                        name_a,
                        name_b,
                        pin_a
                    ));
                }
            }
        }

        if self.pins.current_channel >= 8 {
            return Err(eyre!(
                "Invalid ADC channel {}: the MCP3008 has channels 0-7",
                self.pins.current_channel
            ));
        }

        if self.sampling.publish_interval_secs == 0 {
            return Err(eyre!("publish_interval_secs must be greater than zero"));
        }
        if self.sampling.reconnect_delay_secs == 0 {
            return Err(eyre!("reconnect_delay_secs must be greater than zero"));
        }

        Ok(())
    }

    /// Telemetry topic for this station.
    pub fn telemetry_topic(&self) -> String {
        format!("maquinas/{}/datos", self.station.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_station_wiring() {
        let config = BridgeConfig::default();
        assert_eq!(config.station.name, "estacion_2");
        assert_eq!(config.broker.port, 1883);
        assert_eq!(config.pins.motor_externo, 22);
        assert_eq!(config.pins.motor_interno, 24);
        assert_eq!(config.pins.encoder_a, 2);
        assert_eq!(config.pins.encoder_b, 3);
        assert_eq!(config.pins.current_channel, 0);
        assert_eq!(config.sampling.publish_interval_secs, 5);
        assert!(config.broker.username.is_none());
    }

    #[test]
    fn default_config_roundtrips_through_toml() {
        let config = BridgeConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: BridgeConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn parses_handwritten_config() {
        let content = r#"
            [station]
            name = "estacion_5"
            client_id = "bridge-5"

            [broker]
            host = "broker.planta.local"
            port = 1883
            username = "telemetria"
            password = "secreto"
            keep_alive_secs = 10

            [pins]
            motor_externo = 17
            motor_interno = 27
            encoder_a = 5
            encoder_b = 6
            current_channel = 3

            [sampling]
            publish_interval_secs = 2
            reconnect_delay_secs = 5
        "#;
        let config: BridgeConfig = toml::from_str(content).unwrap();
        assert_eq!(config.station.name, "estacion_5");
        assert_eq!(config.broker.username.as_deref(), Some("telemetria"));
        assert_eq!(config.pins.current_channel, 3);
        assert_eq!(config.telemetry_topic(), "maquinas/estacion_5/datos");
        config.validate().unwrap();
    }

    #[test]
    fn telemetry_topic_uses_station_name() {
        let config = BridgeConfig::default();
        assert_eq!(config.telemetry_topic(), "maquinas/estacion_2/datos");
    }

    #[test]
    fn validate_rejects_pin_collisions() {
        let mut config = BridgeConfig::default();
        config.pins.encoder_b = config.pins.motor_externo;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_adc_channel() {
        let mut config = BridgeConfig::default();
        config.pins.current_channel = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_intervals() {
        let mut config = BridgeConfig::default();
        config.sampling.publish_interval_secs = 0;
        assert!(config.validate().is_err());
    }
}
