use serde::{Deserialize, Serialize};

/// One telemetry sample.
///
/// Field order is the wire order. `cpu_temp == 0` means the temperature
/// could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Local wall-clock time, `HH:MM`.
    pub time: String,
    /// CPU utilization in percent.
    pub cpu_load: u8,
    /// Output volume in percent.
    pub volume: u8,
    /// CPU temperature in degrees Celsius.
    pub cpu_temp: i32,
}

impl Snapshot {
    /// Highest valid percentage value.
    pub const MAX_PERCENT: u8 = 100;

    /// Build a snapshot, clamping percentages to `0..=100`.
    pub fn new(time: impl Into<String>, cpu_load: u8, volume: u8, cpu_temp: i32) -> Self {
        Self {
            time: time.into(),
            cpu_load: cpu_load.min(Self::MAX_PERCENT),
            volume: volume.min(Self::MAX_PERCENT),
            cpu_temp,
        }
    }

    /// A snapshot carrying only the time, every reading zero.
    pub fn placeholder(time: impl Into<String>) -> Self {
        Self::new(time, 0, 0, 0)
    }

    /// Whether a temperature reading is present.
    pub fn has_temperature(&self) -> bool {
        self.cpu_temp != 0
    }
}
