//! Opening the output device.

use std::io::{self, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, StopBits};
use tracing::info;

use crate::config::ForwarderConfig;
use crate::discovery::DeviceCandidate;

/// An open, writable device connection.
pub type DeviceHandle = Box<dyn Write + Send>;

/// Opens a discovered candidate for writing.
pub trait DeviceOpener: Send {
    fn open(&self, candidate: &DeviceCandidate) -> io::Result<DeviceHandle>;
}

/// Opens serial ports as 8N1 without flow control.
#[derive(Debug, Clone, Copy)]
pub struct SerialDeviceOpener {
    pub baud_rate: u32,
    pub timeout: Duration,
}

impl SerialDeviceOpener {
    pub fn new(baud_rate: u32, timeout: Duration) -> Self {
        Self { baud_rate, timeout }
    }

    pub fn from_config(config: &ForwarderConfig) -> Self {
        Self::new(config.baud_rate, config.io_timeout)
    }
}

impl Default for SerialDeviceOpener {
    fn default() -> Self {
        Self::from_config(&ForwarderConfig::default())
    }
}

impl DeviceOpener for SerialDeviceOpener {
    fn open(&self, candidate: &DeviceCandidate) -> io::Result<DeviceHandle> {
        let port = serialport::new(candidate.path.as_str(), self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.timeout)
            .open()
            .map_err(io::Error::from)?;

        info!(path = %candidate.path, baud_rate = self.baud_rate, "opened serial device");
        Ok(Box::new(port))
    }
}
