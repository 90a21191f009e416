//! Sensor capability consumed by the sampler, plus a `sysinfo` backend.

use sysinfo::{Components, System};

/// Errors from a single sensor read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    /// The platform offers no way to read this value.
    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    /// The sensor exists but produced no usable value this time.
    #[error("{0} reading unavailable")]
    Unavailable(&'static str),

    /// The backend failed.
    #[error("sensor backend error: {0}")]
    Backend(String),
}

/// Source of raw hardware readings.
///
/// Each method is called once per sampling tick and may fail independently
/// of the others.
pub trait SensorSource: Send {
    /// CPU utilization in percent.
    fn read_cpu_load(&mut self) -> Result<u8, SensorError>;

    /// CPU temperature in degrees Celsius; `0` means unavailable.
    fn read_cpu_temperature(&mut self) -> Result<i32, SensorError>;

    /// Output volume in percent.
    fn read_volume(&mut self) -> Result<u8, SensorError>;
}

impl<S: SensorSource + ?Sized> SensorSource for Box<S> {
    fn read_cpu_load(&mut self) -> Result<u8, SensorError> {
        (**self).read_cpu_load()
    }

    fn read_cpu_temperature(&mut self) -> Result<i32, SensorError> {
        (**self).read_cpu_temperature()
    }

    fn read_volume(&mut self) -> Result<u8, SensorError> {
        (**self).read_volume()
    }
}

/// Sensors backed by `sysinfo`.
///
/// CPU load comes from the global usage counter, which needs one earlier
/// refresh to produce a non-zero value; construction primes it. Temperature
/// comes from the hardware component list. There is no portable output
/// volume API, so volume always reports [`SensorError::Unsupported`].
pub struct SystemSensors {
    system: System,
    components: Components,
}

impl SystemSensors {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self {
            system,
            components: Components::new_with_refreshed_list(),
        }
    }
}

impl Default for SystemSensors {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for SystemSensors {
    fn read_cpu_load(&mut self) -> Result<u8, SensorError> {
        self.system.refresh_cpu_usage();
        let usage = self.system.global_cpu_usage();
        if !usage.is_finite() {
            return Err(SensorError::Unavailable("cpu load"));
        }
        Ok(usage.round().clamp(0.0, 100.0) as u8)
    }

    fn read_cpu_temperature(&mut self) -> Result<i32, SensorError> {
        self.components.refresh(false);
        let readings = self
            .components
            .list()
            .iter()
            .filter_map(|c| c.temperature().map(|t| (c.label(), t)));
        pick_cpu_temperature(readings).ok_or(SensorError::Unavailable("cpu temperature"))
    }

    fn read_volume(&mut self) -> Result<u8, SensorError> {
        Err(SensorError::Unsupported("output volume"))
    }
}

/// Pick the CPU temperature out of labelled component readings.
///
/// Die sensors (`Tctl`/`Tdie`) beat package sensors, which beat any other
/// CPU/core sensor. Non-positive and non-finite readings are ignored.
pub fn pick_cpu_temperature<'a>(
    readings: impl IntoIterator<Item = (&'a str, f32)>,
) -> Option<i32> {
    let mut best: Option<(u8, f32)> = None;
    for (label, celsius) in readings {
        if !celsius.is_finite() || celsius <= 0.0 {
            continue;
        }
        let label = label.to_ascii_lowercase();
        let priority = if label.contains("tctl") || label.contains("tdie") {
            3
        } else if label.contains("package") {
            2
        } else if label.contains("cpu") || label.contains("core") || label.contains("k10temp")
        {
            1
        } else {
            continue;
        };
        if best.map_or(true, |(p, _)| priority > p) {
            best = Some((priority, celsius));
        }
    }
    best.map(|(_, celsius)| celsius.round() as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn die_sensor_beats_package_and_core() {
        let readings = [
            ("coretemp Core 0", 48.0),
            ("coretemp Package id 0", 51.2),
            ("k10temp Tctl", 55.6),
        ];
        assert_eq!(pick_cpu_temperature(readings), Some(56));
    }

    #[test]
    fn first_sensor_wins_within_priority() {
        let readings = [("Core 0", 40.0), ("Core 1", 60.0)];
        assert_eq!(pick_cpu_temperature(readings), Some(40));
    }

    #[test]
    fn non_cpu_and_invalid_readings_are_ignored() {
        let readings = [
            ("nvme Composite", 38.0),
            ("Package id 0", 0.0),
            ("Core 0", f32::NAN),
        ];
        assert_eq!(pick_cpu_temperature(readings), None);
    }

    #[test]
    fn boxed_source_delegates() {
        struct Fixed;
        impl SensorSource for Fixed {
            fn read_cpu_load(&mut self) -> Result<u8, SensorError> {
                Ok(12)
            }
            fn read_cpu_temperature(&mut self) -> Result<i32, SensorError> {
                Ok(34)
            }
            fn read_volume(&mut self) -> Result<u8, SensorError> {
                Ok(56)
            }
        }

        let mut source: Box<dyn SensorSource> = Box::new(Fixed);
        assert_eq!(source.read_cpu_load(), Ok(12));
        assert_eq!(source.read_cpu_temperature(), Ok(34));
        assert_eq!(source.read_volume(), Ok(56));
    }

    #[test]
    fn system_volume_is_unsupported() {
        let mut sensors = SystemSensors::new();
        assert_eq!(
            sensors.read_volume(),
            Err(SensorError::Unsupported("output volume"))
        );
        assert!(sensors.read_cpu_load().map(|load| load <= 100).unwrap_or(true));
    }
}
