//! Telemetry distribution pipeline.
//!
//! Four long-running components, each on its own thread, joined only by
//! [`SnapshotCache`]s and a shared [`StopSignal`]:
//!
//! - [`Sampler`] reads a [`SensorSource`] every second into the service cache.
//! - [`Publisher`] serves the service cache to one channel reader at a time.
//! - [`Subscriber`] reads the channel into the client cache, reconnecting on loss.
//! - [`Forwarder`] writes the client cache to the serial device chosen by
//!   [`DeviceDiscovery`], rebinding when the device goes away.

pub mod cache;
pub mod clock;
pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod forwarder;
pub mod publisher;
pub mod sampler;
pub mod sensor;
pub mod stop;
pub mod subscriber;

pub use cache::SnapshotCache;
pub use clock::{local_clock, local_hhmm, Clock};
pub use config::{ForwarderConfig, PublisherConfig, SamplerConfig, SubscriberConfig};
pub use device::{DeviceHandle, DeviceOpener, SerialDeviceOpener};
pub use discovery::{
    rank_candidates, select_best, DeviceCandidate, DeviceDiscovery, DeviceEnumerator,
    DeviceMatcher, InvalidUsbId, MatchRank, RankedCandidate, SerialPortEnumerator, UsbId,
};
pub use error::{DiscoveryError, PipelineError, Result};
pub use forwarder::{Forwarder, ForwarderStatus, TickOutcome};
pub use publisher::probe_bind;
pub use publisher::{Publisher, PublisherState, PublisherStatus};
pub use sampler::Sampler;
pub use sensor::{SensorError, SensorSource, SystemSensors};
pub use stop::StopSignal;
pub use subscriber::{Subscriber, SubscriberHandle, SubscriberState};
pub use traymon_frame::Snapshot;
