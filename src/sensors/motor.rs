//! Digital inputs for the two motor run contacts.

use rppal::gpio::{Gpio, InputPin, Level};
use tracing::{debug, info};

use super::SensorError;

/// Snapshot of both motor contacts at one sampling instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorSnapshot {
    /// External motor contact state
    pub externo: bool,
    /// Internal motor contact state
    pub interno: bool,
}

/// The two motor run contacts, read once per sampling iteration.
pub struct MotorContacts {
    externo: InputPin,
    interno: InputPin,
}

impl MotorContacts {
    /// Claims both contact pins as floating inputs.
    pub fn new(gpio: &Gpio, externo_pin: u8, interno_pin: u8) -> Result<Self, SensorError> {
        let externo = gpio.get(externo_pin)?.into_input();
        let interno = gpio.get(interno_pin)?.into_input();
        info!(
            "Motor contacts initialized on GPIO {} (externo) and GPIO {} (interno)",
            externo_pin, interno_pin
        );
        Ok(Self { externo, interno })
    }

    /// Reads both contacts. The previous snapshot is simply overwritten
    /// by the caller; no history is kept here.
    pub fn read(&self) -> MotorSnapshot {
        let snapshot = MotorSnapshot {
            externo: contact_closed(self.externo.read()),
            interno: contact_closed(self.interno.read()),
        };
        debug!("Motor contacts: {:?}", snapshot);
        snapshot
    }
}

/// A high level on the contact pin means the motor is running.
fn contact_closed(level: Level) -> bool {
    level == Level::High
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_level_reads_as_running() {
        assert!(contact_closed(Level::High));
        assert!(!contact_closed(Level::Low));
    }
}
