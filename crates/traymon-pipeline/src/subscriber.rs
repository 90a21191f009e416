use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};
use traymon_frame::{FrameError, RecordConfig, RecordReader};
use traymon_transport::{IpcStream, UnixDomainSocket};

use crate::cache::SnapshotCache;
use crate::config::SubscriberConfig;
use crate::error::PipelineError;
use crate::stop::StopSignal;

/// Connection state of the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Disconnected,
    Connected,
}

/// Shared view of a running subscriber.
///
/// Besides observing state, the handle can tear down the live connection
/// from another thread, which unblocks a pending read immediately.
#[derive(Debug, Clone, Default)]
pub struct SubscriberHandle {
    connected: Arc<AtomicBool>,
    records: Arc<AtomicU64>,
    live: Arc<Mutex<Option<IpcStream>>>,
}

impl SubscriberHandle {
    pub fn state(&self) -> SubscriberState {
        if self.is_connected() {
            SubscriberState::Connected
        } else {
            SubscriberState::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Number of records stored into the cache so far.
    pub fn records_received(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    /// Shut down the live connection, if any.
    pub fn interrupt(&self) {
        let live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stream) = live.as_ref() {
            if let Err(err) = stream.shutdown() {
                debug!(error = %err, "failed to shut down subscriber stream");
            }
        }
    }

    /// Request stop and interrupt the live connection.
    pub fn stop(&self, stop: &StopSignal) {
        stop.stop();
        self.interrupt();
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    fn attach(&self, stream: Option<IpcStream>) {
        *self.live.lock().unwrap_or_else(PoisonError::into_inner) = stream;
    }
}

/// Reads records from the channel into the client-side cache.
pub struct Subscriber {
    endpoint: PathBuf,
    cache: SnapshotCache,
    config: SubscriberConfig,
    handle: SubscriberHandle,
}

impl Subscriber {
    pub fn new(endpoint: impl Into<PathBuf>, cache: SnapshotCache) -> Self {
        Self {
            endpoint: endpoint.into(),
            cache,
            config: SubscriberConfig::default(),
            handle: SubscriberHandle::default(),
        }
    }

    pub fn with_config(mut self, config: SubscriberConfig) -> Self {
        self.config = config;
        self
    }

    /// The cache records are stored into.
    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn handle(&self) -> SubscriberHandle {
        self.handle.clone()
    }

    /// Connect, read and reconnect until `stop` is requested.
    pub fn run(self, stop: &StopSignal) {
        info!(endpoint = ?self.endpoint, "subscriber started");
        let mut connect_failing = false;

        while !stop.is_stopped() {
            let stream = match UnixDomainSocket::connect(&self.endpoint) {
                Ok(stream) => stream,
                Err(err) => {
                    if connect_failing {
                        debug!(error = %err, "channel still unavailable");
                    } else {
                        warn!(
                            error = %err,
                            retry_in = ?self.config.reconnect_backoff,
                            "cannot connect to telemetry channel"
                        );
                        connect_failing = true;
                    }
                    if stop.wait_timeout(self.config.reconnect_backoff) {
                        break;
                    }
                    continue;
                }
            };
            connect_failing = false;

            match self.session(stream, stop) {
                Ok(()) => {}
                Err(err) if err.is_disconnect() => info!("telemetry channel closed"),
                Err(err) => warn!(error = %err, "telemetry channel read failed"),
            }
            self.handle.attach(None);
            self.handle.set_connected(false);
        }

        info!("subscriber stopped");
    }

    /// Read records until the connection ends or stop is requested.
    fn session(&self, stream: IpcStream, stop: &StopSignal) -> Result<(), PipelineError> {
        let record_config = RecordConfig {
            max_record_size: self.config.max_record_size,
            read_timeout: Some(self.config.read_poll),
            write_timeout: None,
        };
        self.handle.attach(Some(stream.try_clone()?));
        let mut reader = RecordReader::with_config_ipc(stream, record_config)?;

        self.handle.set_connected(true);
        info!("connected to telemetry channel");

        while !stop.is_stopped() {
            match reader.read_record() {
                Ok(snapshot) => {
                    debug!(time = %snapshot.time, cpu_load = snapshot.cpu_load, "record received");
                    self.cache.set(snapshot);
                    self.handle.records.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) if err.is_timeout() => continue,
                Err(err) if err.is_malformed() => {
                    warn!(error = %err, "discarding malformed record");
                }
                Err(FrameError::ConnectionClosed) if stop.is_stopped() => break,
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}
