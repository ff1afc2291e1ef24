//! The wire-format machine reading.

use serde::{Deserialize, Serialize};

/// One sample of all machine inputs.
///
/// Field declaration order is the JSON field order; the plant backend
/// consumes this schema as-is, so the order and names are load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineReading {
    /// External motor contact state
    pub motor_externo: bool,
    /// Internal motor contact state
    pub motor_interno: bool,
    /// Raw current sample from the ADC (0-1023)
    pub corriente: u16,
    /// Signed encoder position counter
    pub encoder: i64,
}

impl MachineReading {
    /// Renders the reading as the JSON payload published to the broker.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_matches_fixed_schema_and_field_order() {
        let reading = MachineReading {
            motor_externo: false,
            motor_interno: true,
            corriente: 512,
            encoder: -7,
        };
        assert_eq!(
            reading.to_json().unwrap(),
            r#"{"motor_externo":false,"motor_interno":true,"corriente":512,"encoder":-7}"#
        );
    }

    #[test]
    fn payload_handles_extreme_values() {
        let reading = MachineReading {
            motor_externo: true,
            motor_interno: true,
            corriente: 1023,
            encoder: i64::MIN,
        };
        let json = reading.to_json().unwrap();
        assert!(json.starts_with(r#"{"motor_externo":true"#));
        assert!(json.ends_with(&format!(r#""encoder":{}}}"#, i64::MIN)));
    }

    #[test]
    fn payload_roundtrips() {
        let reading = MachineReading {
            motor_externo: true,
            motor_interno: false,
            corriente: 77,
            encoder: 42,
        };
        let parsed: MachineReading = serde_json::from_str(&reading.to_json().unwrap()).unwrap();
        assert_eq!(parsed, reading);
    }
}
