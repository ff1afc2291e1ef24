//! Periodic sensor sampling pipeline.
//!
//! Owns the three input drivers and turns them into a stream of
//! [`MachineReading`]s at the configured publish interval. Built as a
//! statum state machine: hardware is claimed in `Initializing`, the
//! sampling loop runs in `Sampling`.

use statum::{machine, state};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{CurrentSensor, MotorContacts, QuadratureCounter, SensorError};
use crate::config::PinConfig;
use crate::telemetry::MachineReading;
use rppal::gpio::Gpio;

/// Settings for the sampling loop.
#[derive(Clone, Debug)]
pub struct SamplerSettings {
    /// Interval between samples in seconds
    pub publish_interval_secs: u64,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            publish_interval_secs: 5,
        }
    }
}

/// Sampler errors
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

// Define sampler states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum SamplerState {
    Initializing,
    Sampling,
}

#[machine]
pub struct SensorSampler<S: SamplerState> {
    // Motor run contacts
    motors: MotorContacts,

    // Current sensor behind the MCP3008
    current: CurrentSensor,

    // Interrupt-fed encoder counter
    encoder: QuadratureCounter,

    // Sampler settings
    settings: SamplerSettings,

    // Channel for sending readings to the publisher
    reading_sender: mpsc::Sender<MachineReading>,

    // Last good current sample, reused when a read fails
    last_current: u16,
}

// Implementation for Initializing state
impl SensorSampler<Initializing> {
    pub fn create(
        pins: &PinConfig,
        settings: Option<SamplerSettings>,
        reading_sender: mpsc::Sender<MachineReading>,
    ) -> Result<Self, SamplerError> {
        let settings = settings.unwrap_or_default();
        debug!("Creating Sensor Sampler with settings: {:?}", settings);

        let gpio = Gpio::new().map_err(SensorError::from)?;

        let motors = MotorContacts::new(&gpio, pins.motor_externo, pins.motor_interno)?;
        let current = CurrentSensor::new(pins.current_channel)?;
        let encoder = QuadratureCounter::new(&gpio, pins.encoder_a, pins.encoder_b)?;

        Ok(Self::new(
            motors,
            current,
            encoder,
            settings,
            reading_sender,
            0, // last_current
        ))
    }

    // Transition to the Sampling state once all hardware is claimed
    pub fn initialize(self) -> Result<SensorSampler<Sampling>, SamplerError> {
        info!(
            "Sensor Sampler initialized, sampling every {}s",
            self.settings.publish_interval_secs
        );
        Ok(self.transition())
    }
}

// Implementation for the Sampling state
impl SensorSampler<Sampling> {
    /// Reads every input once and assembles a reading.
    ///
    /// A failed current read is logged and replaced with the previous
    /// sample; the loop never stops over a bad conversion.
    pub fn sample(&mut self) -> MachineReading {
        let motors = self.motors.read();

        let corriente = match self.current.read() {
            Ok(value) => {
                self.last_current = value;
                value
            }
            Err(e) => {
                warn!("Current read failed, reusing last sample: {}", e);
                self.last_current
            }
        };

        MachineReading {
            motor_externo: motors.externo,
            motor_interno: motors.interno,
            corriente,
            encoder: self.encoder.value(),
        }
    }

    // Run the sampling loop until shutdown
    pub async fn run_sampling_loop(
        &mut self,
        shutdown: CancellationToken,
    ) -> Result<(), SamplerError> {
        info!("Starting sensor sampling loop");

        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
            self.settings.publish_interval_secs,
        ));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Sensor sampling loop shutting down");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    let reading = self.sample();
                    debug!("Sampled reading: {:?}", reading);

                    match self.reading_sender.try_send(reading) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            warn!("Reading channel full, dropping sample");
                        }
                        Err(TrySendError::Closed(_)) => {
                            return Err(SamplerError::ChannelError(
                                "reading receiver closed".to_string(),
                            ));
                        }
                    }
                }
            }
        }
    }
}

/// Handle for the sampling task.
///
/// Claims the sensor hardware on the caller's thread so wiring mistakes
/// surface as a startup error, then runs the sampling loop as a tokio task.
pub struct SamplerHandle {}

impl SamplerHandle {
    pub fn spawn(
        pins: &PinConfig,
        settings: Option<SamplerSettings>,
        reading_sender: mpsc::Sender<MachineReading>,
        shutdown: CancellationToken,
    ) -> Result<Self, SamplerError> {
        info!("Spawning Sensor Sampler with settings: {:?}", settings);

        let sampler = SensorSampler::create(pins, settings, reading_sender)?;
        info!("Successfully created SensorSampler instance");

        tokio::spawn(async move {
            match sampler.initialize() {
                Ok(mut sampling_state) => {
                    if let Err(e) = sampling_state.run_sampling_loop(shutdown).await {
                        error!("Sampler task terminated with error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Failed to initialize Sensor Sampler: {}", e);
                }
            }
        });

        Ok(Self {})
    }
}
