use chrono::NaiveDateTime;
use std::fmt;

use super::reading::MachineReading;

const PREVIEW_LEN: usize = 40;

/// A rendered telemetry message ready for publishing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelemetryMessage {
    topic: String,
    payload: String,
    timestamp: NaiveDateTime,
}

impl fmt::Display for TelemetryMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let preview = match self.payload.char_indices().nth(PREVIEW_LEN) {
            Some((idx, _)) => &self.payload[..idx],
            None => &self.payload,
        };
        write!(f, "{} - {}", self.timestamp, preview)
    }
}

impl TelemetryMessage {
    /// Renders a reading into its publishable form, stamped with the
    /// local time of sampling.
    pub fn from_reading(topic: &str, reading: &MachineReading) -> serde_json::Result<Self> {
        Ok(TelemetryMessage {
            topic: topic.to_string(),
            payload: reading.to_json()?,
            timestamp: chrono::Local::now().naive_local(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Full multi-line rendering for the publish log.
    pub fn render(&self) -> String {
        format!("{}: {}\n{}", self.timestamp, self.topic, self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reading() -> MachineReading {
        MachineReading {
            motor_externo: false,
            motor_interno: true,
            corriente: 512,
            encoder: -7,
        }
    }

    #[test]
    fn message_carries_topic_and_json_payload() {
        let message =
            TelemetryMessage::from_reading("maquinas/estacion_2/datos", &sample_reading()).unwrap();
        assert_eq!(message.topic(), "maquinas/estacion_2/datos");
        assert_eq!(message.payload(), sample_reading().to_json().unwrap());
    }

    #[test]
    fn render_contains_topic_and_payload() {
        let message =
            TelemetryMessage::from_reading("maquinas/estacion_2/datos", &sample_reading()).unwrap();
        let rendered = message.render();
        assert!(rendered.contains("maquinas/estacion_2/datos"));
        assert!(rendered.contains(r#""corriente":512"#));
    }

    #[test]
    fn display_truncates_long_payloads() {
        let message =
            TelemetryMessage::from_reading("maquinas/estacion_2/datos", &sample_reading()).unwrap();
        let shown = format!("{}", message);
        let preview = shown.split(" - ").nth(1).unwrap();
        assert!(preview.chars().count() <= PREVIEW_LEN);
    }
}
