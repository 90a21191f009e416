//! Timing and I/O settings for each pipeline component.

use std::time::Duration;

use traymon_frame::DEFAULT_MAX_RECORD;
use traymon_transport::UnixDomainSocket;

/// Controls the hardware sampling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Time between samples.
    pub interval: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Controls the channel publisher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Time between records sent to a connected reader.
    pub publish_interval: Duration,
    /// Wait before retrying a failed endpoint bind.
    pub rebind_backoff: Duration,
    /// Longest single wait for a reader before re-checking for stop.
    pub accept_poll: Duration,
    /// Write timeout on the reader connection.
    pub write_timeout: Duration,
    /// Permission bits of the socket file.
    pub socket_mode: u32,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            publish_interval: Duration::from_secs(1),
            rebind_backoff: Duration::from_secs(5),
            accept_poll: Duration::from_millis(200),
            write_timeout: Duration::from_secs(2),
            socket_mode: UnixDomainSocket::DEFAULT_SOCKET_MODE,
        }
    }
}

/// Controls the channel subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberConfig {
    /// Wait before retrying a failed connect.
    pub reconnect_backoff: Duration,
    /// Read timeout used to poll for stop while waiting for a record.
    pub read_poll: Duration,
    /// Largest record accepted before the connection is dropped.
    pub max_record_size: usize,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: Duration::from_secs(5),
            read_poll: Duration::from_millis(250),
            max_record_size: DEFAULT_MAX_RECORD,
        }
    }
}

/// Controls the device forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwarderConfig {
    /// Time between records written to the device.
    pub period: Duration,
    /// Rescan interval while a device is bound.
    pub rescan_interval: Duration,
    /// Serial line speed.
    pub baud_rate: u32,
    /// Serial read/write timeout.
    pub io_timeout: Duration,
}

impl ForwarderConfig {
    /// Default serial line speed of the display firmware.
    pub const DEFAULT_BAUD_RATE: u32 = 115_200;
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            rescan_interval: Duration::from_secs(10),
            baud_rate: Self::DEFAULT_BAUD_RATE,
            io_timeout: Duration::from_secs(1),
        }
    }
}
