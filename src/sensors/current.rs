//! Analog current sensor read through an MCP3008 ADC on SPI0.
//!
//! The MCP3008 speaks a 3-byte single-ended protocol: a start bit, then the
//! channel selection in the upper nibble of the second byte, then clocking
//! out the 10-bit conversion result across the last two received bytes.

use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use tracing::{debug, info};

use super::SensorError;

const SPI_CLOCK_HZ: u32 = 1_000_000;

/// Current sensor behind one MCP3008 channel.
pub struct CurrentSensor {
    spi: Spi,
    channel: u8,
}

impl CurrentSensor {
    /// Opens SPI0/CE0 and binds the sensor to `channel`.
    pub fn new(channel: u8) -> Result<Self, SensorError> {
        if channel >= 8 {
            return Err(SensorError::InvalidChannel(channel));
        }
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)?;
        info!("MCP3008 initialized on SPI0.0, current sensor on channel {}", channel);
        Ok(Self { spi, channel })
    }

    /// Performs one conversion and returns the raw 10-bit sample (0-1023).
    pub fn read(&mut self) -> Result<u16, SensorError> {
        let tx_buffer = request_frame(self.channel);
        let mut rx_buffer = [0u8; 3];
        self.spi.transfer(&mut rx_buffer, &tx_buffer)?;
        let value = decode_frame(rx_buffer);
        debug!("Current sample: {}", value);
        Ok(value)
    }
}

/// Builds the single-ended conversion request for `channel`.
fn request_frame(channel: u8) -> [u8; 3] {
    [0x01, (0x08 | channel) << 4, 0x00]
}

/// Extracts the 10-bit result from the raw SPI response.
fn decode_frame(rx_buffer: [u8; 3]) -> u16 {
    (((rx_buffer[1] & 0x03) as u16) << 8) | (rx_buffer[2] as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_frame_selects_channel() {
        assert_eq!(request_frame(0), [0x01, 0x80, 0x00]);
        assert_eq!(request_frame(3), [0x01, 0xB0, 0x00]);
        assert_eq!(request_frame(7), [0x01, 0xF0, 0x00]);
    }

    #[test]
    fn decode_frame_reassembles_ten_bits() {
        assert_eq!(decode_frame([0x00, 0x03, 0xFF]), 1023);
        assert_eq!(decode_frame([0x00, 0x02, 0x00]), 512);
        assert_eq!(decode_frame([0x00, 0x00, 0x00]), 0);
    }

    #[test]
    fn decode_frame_masks_undefined_upper_bits() {
        // Bits above the 10-bit result are undefined on the wire and must
        // not leak into the sample.
        assert_eq!(decode_frame([0xFF, 0xFF, 0xFF]), 1023);
        assert_eq!(decode_frame([0xAB, 0xFC, 0x01]), 1);
    }
}
