//! Sensor subsystem for the station's machine inputs
//!
//! Implements the three input drivers and the sampling pipeline:
//!
//! 1. [`motor`] - Digital motor contact inputs
//! 2. [`current`] - Analog current sensor behind an MCP3008 ADC
//! 3. [`encoder`] - Interrupt-driven quadrature position counter
//! 4. [`sampler`] - Periodic sampling and reading distribution
//!
//! # Architecture
//!
//! ```text
//! GPIO/SPI ──► Motor + Current + Encoder ──► Sampler ──► MachineReading
//!              (per-iteration reads)         (interval)
//! ```
//!
//! The encoder counter is the only state written outside the sampling task:
//! the GPIO interrupt callback updates it on every edge of channel A while
//! the sampler only loads it.

pub mod current;
pub mod encoder;
pub mod motor;
pub mod sampler;

pub use current::CurrentSensor;
pub use encoder::QuadratureCounter;
pub use motor::{MotorContacts, MotorSnapshot};
pub use sampler::{SamplerError, SamplerHandle, SamplerSettings};

/// Errors raised by the individual sensor drivers.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("GPIO access failed: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("SPI access failed: {0}")]
    Spi(#[from] rppal::spi::Error),

    #[error("Invalid ADC channel {0}, the MCP3008 has channels 0-7")]
    InvalidChannel(u8),
}
