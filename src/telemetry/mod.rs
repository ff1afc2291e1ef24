//! # Telemetry Module
//!
//! Provides the MQTT upload path for the station bridge: every sensor
//! reading is rendered to the fixed JSON schema and published to the
//! station's telemetry topic on the plant broker.
//!
//! ## Module Architecture
//!
//! The telemetry system is organized into three focused submodules:
//!
//! ```text
//! telemetry/
//! ├── reading.rs    - The wire-format sensor reading
//! ├── message.rs    - Message representation and log rendering
//! └── publisher.rs  - Broker connection lifecycle and publishing
//! ```
//!
//! ## Design Philosophy
//!
//! - **Fixed schema**: the payload has exactly four fields in a fixed
//!   order; consumers parse it positionally as well as by name
//! - **Uniform failure handling**: every broker error leads to the same
//!   fixed-delay reconnect, with no backoff and no attempt limit
//! - **Publish-only**: the bridge never subscribes; the connection exists
//!   solely to upload readings at QoS 0

pub mod message;
pub mod publisher;
pub mod reading;

pub use message::TelemetryMessage;
pub use publisher::{ConnectionState, PublisherHandle, PublisherSettings, PublisherStatus};
pub use reading::MachineReading;
