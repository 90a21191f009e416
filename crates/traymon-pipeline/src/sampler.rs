use tracing::{debug, info, warn};
use traymon_frame::Snapshot;

use crate::cache::SnapshotCache;
use crate::clock::{local_clock, Clock};
use crate::config::SamplerConfig;
use crate::sensor::{SensorError, SensorSource};
use crate::stop::StopSignal;

/// Periodically samples a [`SensorSource`] into the service-side cache.
///
/// Every tick produces a complete snapshot. A failing sensor contributes its
/// fallback instead: the last good CPU load, or `0` for temperature and
/// volume.
pub struct Sampler<S> {
    source: S,
    cache: SnapshotCache,
    config: SamplerConfig,
    clock: Clock,
    last_cpu_load: u8,
    failing: SensorFailures,
}

#[derive(Debug, Default)]
struct SensorFailures {
    cpu_load: bool,
    cpu_temp: bool,
    volume: bool,
}

impl<S: SensorSource> Sampler<S> {
    /// Create a sampler writing into `cache`.
    pub fn new(source: S, cache: SnapshotCache) -> Self {
        Self {
            source,
            cache,
            config: SamplerConfig::default(),
            clock: local_clock(),
            last_cpu_load: 0,
            failing: SensorFailures::default(),
        }
    }

    /// Override sampler config.
    pub fn with_config(mut self, config: SamplerConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the wall clock used for the `time` field.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Take one sample, store it in the cache and return it.
    pub fn sample_once(&mut self) -> Snapshot {
        let cpu_load = match self.source.read_cpu_load() {
            Ok(load) => {
                recovered(&mut self.failing.cpu_load, "cpu_load");
                self.last_cpu_load = load;
                load
            }
            Err(err) => {
                failed(&mut self.failing.cpu_load, "cpu_load", &err);
                self.last_cpu_load
            }
        };

        let cpu_temp = match self.source.read_cpu_temperature() {
            Ok(temp) => {
                recovered(&mut self.failing.cpu_temp, "cpu_temp");
                temp
            }
            Err(err) => {
                failed(&mut self.failing.cpu_temp, "cpu_temp", &err);
                0
            }
        };

        let volume = match self.source.read_volume() {
            Ok(volume) => {
                recovered(&mut self.failing.volume, "volume");
                volume
            }
            Err(err) => {
                failed(&mut self.failing.volume, "volume", &err);
                0
            }
        };

        let snapshot = Snapshot::new((self.clock)(), cpu_load, volume, cpu_temp);
        self.cache.set(snapshot.clone());
        snapshot
    }

    /// Sample until `stop` is requested.
    pub fn run(mut self, stop: &StopSignal) {
        info!(interval = ?self.config.interval, "sampler started");
        while !stop.is_stopped() {
            let snapshot = self.sample_once();
            debug!(
                cpu_load = snapshot.cpu_load,
                cpu_temp = snapshot.cpu_temp,
                volume = snapshot.volume,
                "sampled"
            );
            if stop.wait_timeout(self.config.interval) {
                break;
            }
        }
        info!("sampler stopped");
    }
}

fn failed(flag: &mut bool, sensor: &'static str, err: &SensorError) {
    if *flag {
        debug!(sensor, error = %err, "sensor still failing");
    } else {
        warn!(sensor, error = %err, "sensor read failed; using fallback");
        *flag = true;
    }
}

fn recovered(flag: &mut bool, sensor: &'static str) {
    if std::mem::take(flag) {
        info!(sensor, "sensor recovered");
    }
}
