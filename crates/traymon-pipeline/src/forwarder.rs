use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tracing::{debug, info, warn};
use traymon_frame::{RecordWriter, Snapshot};

use crate::cache::SnapshotCache;
use crate::clock::{local_clock, Clock};
use crate::config::ForwarderConfig;
use crate::device::{DeviceHandle, DeviceOpener};
use crate::discovery::{DeviceCandidate, DeviceDiscovery, DeviceEnumerator};
use crate::error::PipelineError;
use crate::stop::StopSignal;
use crate::subscriber::SubscriberHandle;

/// Result of one forwarding iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A record was written to the bound device.
    Sent,
    /// No device is bound; nothing was written.
    Unbound,
    /// The write failed and the device was released.
    WriteFailed,
}

/// Shared view of the forwarder's binding.
#[derive(Debug, Clone, Default)]
pub struct ForwarderStatus {
    bound: Arc<Mutex<Option<String>>>,
    sent: Arc<AtomicU64>,
}

impl ForwarderStatus {
    /// Path of the device currently bound, if any.
    pub fn bound_device(&self) -> Option<String> {
        self.bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_bound(&self) -> bool {
        self.bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Records written to any device so far.
    pub fn records_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    fn set_bound(&self, path: Option<String>) {
        *self.bound.lock().unwrap_or_else(PoisonError::into_inner) = path;
    }
}

struct BoundDevice {
    candidate: DeviceCandidate,
    writer: RecordWriter<DeviceHandle>,
}

/// Writes the client cache to the best available display device.
///
/// The device is re-discovered every `rescan_interval` while bound and on
/// every tick while unbound. A write failure releases the device at once;
/// it is only written to again after a later scan selects it.
pub struct Forwarder<E, O> {
    discovery: DeviceDiscovery<E>,
    opener: O,
    cache: SnapshotCache,
    config: ForwarderConfig,
    clock: Clock,
    link: Option<SubscriberHandle>,
    bound: Option<BoundDevice>,
    last_scan: Option<Instant>,
    reported_missing: bool,
    failed_open: Option<String>,
    status: ForwarderStatus,
}

impl<E: DeviceEnumerator, O: DeviceOpener> Forwarder<E, O> {
    pub fn new(discovery: DeviceDiscovery<E>, opener: O, cache: SnapshotCache) -> Self {
        Self {
            discovery,
            opener,
            cache,
            config: ForwarderConfig::default(),
            clock: local_clock(),
            link: None,
            bound: None,
            last_scan: None,
            reported_missing: false,
            failed_open: None,
            status: ForwarderStatus::default(),
        }
    }

    pub fn with_config(mut self, config: ForwarderConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock used for the placeholder record, and for re-stamping cached
    /// records while the channel is down.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Track the channel subscriber feeding the cache.
    ///
    /// While it is disconnected the last cached record is still forwarded,
    /// but with `time` taken from the forwarder's clock.
    pub fn with_link(mut self, link: SubscriberHandle) -> Self {
        self.link = Some(link);
        self
    }

    pub fn status(&self) -> ForwarderStatus {
        self.status.clone()
    }

    /// One forwarding iteration at time `now`.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let scan_due = self.bound.is_none()
            || self
                .last_scan
                .map_or(true, |last| now.saturating_duration_since(last) >= self.config.rescan_interval);
        if scan_due {
            self.rescan(now);
        }

        let Some(device) = self.bound.as_mut() else {
            return TickOutcome::Unbound;
        };

        let snapshot = match self.cache.get() {
            Some(mut cached) => {
                if self.link.as_ref().is_some_and(|link| !link.is_connected()) {
                    cached.time = (self.clock)();
                }
                cached
            }
            None => Snapshot::placeholder((self.clock)()),
        };

        match device.writer.send(&snapshot) {
            Ok(()) => {
                self.status.sent.fetch_add(1, Ordering::Relaxed);
                debug!(path = %device.candidate.path, time = %snapshot.time, "record forwarded");
                TickOutcome::Sent
            }
            Err(source) => {
                let err = PipelineError::DeviceWrite {
                    path: device.candidate.path.clone(),
                    source,
                };
                warn!(error = %err, "device write failed; releasing device");
                self.unbind();
                TickOutcome::WriteFailed
            }
        }
    }

    /// Forward until `stop` is requested, then release the device.
    pub fn run(mut self, stop: &StopSignal) {
        info!(
            period = ?self.config.period,
            rescan_interval = ?self.config.rescan_interval,
            "forwarder started"
        );
        while !stop.is_stopped() {
            self.tick(Instant::now());
            if stop.wait_timeout(self.config.period) {
                break;
            }
        }
        self.unbind();
        info!("forwarder stopped");
    }

    fn rescan(&mut self, now: Instant) {
        self.last_scan = Some(now);

        let Some(candidate) = self.discovery.scan() else {
            if let Some(device) = &self.bound {
                info!(path = %device.candidate.path, "device no longer present");
                self.unbind();
            }
            if !self.reported_missing {
                info!("no display device found");
                self.reported_missing = true;
            }
            return;
        };
        self.reported_missing = false;

        if let Some(device) = &self.bound {
            if device.candidate.path == candidate.path {
                return;
            }
            info!(
                from = %device.candidate.path,
                to = %candidate.path,
                "switching display device"
            );
            self.unbind();
        }

        match self.opener.open(&candidate) {
            Ok(handle) => {
                info!(path = %candidate.path, "display device bound");
                self.failed_open = None;
                self.status.set_bound(Some(candidate.path.clone()));
                self.bound = Some(BoundDevice {
                    writer: RecordWriter::new(handle),
                    candidate,
                });
            }
            Err(source) => {
                let err = PipelineError::DeviceOpen {
                    path: candidate.path.clone(),
                    source,
                };
                if self.failed_open.as_deref() == Some(candidate.path.as_str()) {
                    debug!(error = %err, "device still cannot be opened");
                } else {
                    warn!(error = %err, "cannot open display device");
                    self.failed_open = Some(candidate.path);
                }
            }
        }
    }

    fn unbind(&mut self) {
        if let Some(device) = self.bound.take() {
            debug!(path = %device.candidate.path, "closing display device");
            drop(device);
        }
        self.status.set_bound(None);
    }
}
