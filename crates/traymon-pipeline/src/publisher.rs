use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, trace, warn};
use traymon_frame::{RecordConfig, RecordWriter};
use traymon_transport::{IpcStream, UnixDomainSocket};

use crate::cache::SnapshotCache;
use crate::config::PublisherConfig;
use crate::error::{PipelineError, Result};
use crate::stop::StopSignal;

/// Where the publisher is in its listen/serve cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublisherState {
    /// No endpoint bound (startup, after a failure, or backing off).
    Idle,
    /// Endpoint bound, waiting for a reader.
    Listening,
    /// Serving one reader.
    Connected,
    /// The run loop has returned.
    Stopped,
}

/// Observable publisher state, shared with other threads.
#[derive(Debug, Clone)]
pub struct PublisherStatus {
    state: Arc<Mutex<PublisherState>>,
    sessions: Arc<AtomicU64>,
}

impl PublisherStatus {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PublisherState::Idle)),
            sessions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current state.
    pub fn state(&self) -> PublisherState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of reader sessions that have ended.
    ///
    /// A connection that closes before its first record is not counted.
    pub fn sessions_served(&self) -> u64 {
        self.sessions.load(Ordering::Relaxed)
    }

    fn set(&self, state: PublisherState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

enum SessionEnd {
    /// The reader went away after `delivered` records.
    Closed { delivered: u64 },
    /// The session broke for another reason; the endpoint is rebuilt.
    Failed(PipelineError),
    Stopped,
}

/// Serves the latest snapshot to one channel reader at a time.
///
/// ```text
/// Idle --bind--> Listening --accept--> Connected --write fails--> Idle
///   ^  bind fails: wait rebind_backoff                              |
///   +----------------------------------------------------------------+
/// ```
///
/// After a reader disconnects the bound endpoint is kept, so a reader that
/// is already waiting is served next. Any other failure drops the endpoint
/// and rebinds it.
pub struct Publisher {
    endpoint: PathBuf,
    cache: SnapshotCache,
    config: PublisherConfig,
    status: PublisherStatus,
}

impl Publisher {
    /// Create a publisher for the socket at `endpoint`, serving `cache`.
    pub fn new(endpoint: impl Into<PathBuf>, cache: SnapshotCache) -> Self {
        Self {
            endpoint: endpoint.into(),
            cache,
            config: PublisherConfig::default(),
            status: PublisherStatus::new(),
        }
    }

    /// Override publisher config.
    pub fn with_config(mut self, config: PublisherConfig) -> Self {
        self.config = config;
        self
    }

    /// Handle for observing this publisher from another thread.
    pub fn status(&self) -> PublisherStatus {
        self.status.clone()
    }

    /// Run the listen/serve loop until `stop` is requested.
    pub fn run(self, stop: &StopSignal) {
        info!(endpoint = ?self.endpoint, "publisher started");
        let mut listener: Option<UnixDomainSocket> = None;
        let mut bind_failing = false;

        while !stop.is_stopped() {
            let bound = match listener.take() {
                Some(bound) => bound,
                None => {
                    self.status.set(PublisherState::Idle);
                    match UnixDomainSocket::bind_with_mode(&self.endpoint, self.config.socket_mode)
                    {
                        Ok(bound) => {
                            bind_failing = false;
                            bound
                        }
                        Err(err) => {
                            if bind_failing {
                                debug!(error = %err, "telemetry endpoint still unavailable");
                            } else {
                                warn!(
                                    error = %err,
                                    retry_in = ?self.config.rebind_backoff,
                                    "failed to bind telemetry endpoint"
                                );
                                bind_failing = true;
                            }
                            if stop.wait_timeout(self.config.rebind_backoff) {
                                break;
                            }
                            continue;
                        }
                    }
                }
            };

            self.status.set(PublisherState::Listening);
            let stream = match bound.accept_timeout(self.config.accept_poll) {
                Ok(Some(stream)) => stream,
                Ok(None) => {
                    listener = Some(bound);
                    continue;
                }
                Err(err) => {
                    error!(error = %err, "accept failed; rebinding endpoint");
                    drop(bound);
                    if stop.wait_timeout(self.config.rebind_backoff) {
                        break;
                    }
                    continue;
                }
            };

            self.status.set(PublisherState::Connected);
            debug!("reader connected");

            match self.serve(stream, stop) {
                SessionEnd::Closed { delivered: 0 } => {
                    debug!("reader left before the first record");
                    listener = Some(bound);
                }
                SessionEnd::Closed { delivered } => {
                    self.status.sessions.fetch_add(1, Ordering::Relaxed);
                    info!(delivered, "reader disconnected");
                    listener = Some(bound);
                }
                SessionEnd::Failed(err) => {
                    self.status.sessions.fetch_add(1, Ordering::Relaxed);
                    error!(error = %err, "telemetry session failed; rebinding endpoint");
                    drop(bound);
                }
                SessionEnd::Stopped => break,
            }
            self.status.set(PublisherState::Idle);
        }

        self.status.set(PublisherState::Stopped);
        info!("publisher stopped");
    }

    fn serve(&self, stream: IpcStream, stop: &StopSignal) -> SessionEnd {
        let config = RecordConfig {
            write_timeout: Some(self.config.write_timeout),
            ..RecordConfig::default()
        };
        let mut writer = match RecordWriter::with_config_ipc(stream, &config) {
            Ok(writer) => writer,
            Err(err) => return SessionEnd::Failed(err.into()),
        };

        let mut delivered = 0u64;
        loop {
            match self.cache.get() {
                Some(snapshot) => {
                    if let Err(err) = writer.send(&snapshot) {
                        let err = PipelineError::from(err);
                        return if err.is_disconnect() {
                            debug!(error = %err, "write to reader failed");
                            SessionEnd::Closed { delivered }
                        } else {
                            SessionEnd::Failed(err)
                        };
                    }
                    if delivered == 0 {
                        info!("reader connected");
                    }
                    delivered += 1;
                    trace!(time = %snapshot.time, "record published");
                }
                None => trace!("no snapshot yet; skipping tick"),
            }

            if stop.wait_timeout(self.config.publish_interval) {
                return SessionEnd::Stopped;
            }
        }
    }
}

/// Bind the endpoint once, outside the retry loop.
///
/// Used by callers that want a hard failure (e.g. a bad path) reported
/// before starting the long-running loop.
pub fn probe_bind(endpoint: &Path, mode: u32) -> Result<()> {
    UnixDomainSocket::bind_with_mode(endpoint, mode)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};
    use std::time::{Duration, Instant};

    use traymon_frame::{decode_record, Snapshot};

    use super::*;

    fn fast_config() -> PublisherConfig {
        PublisherConfig {
            publish_interval: Duration::from_millis(20),
            rebind_backoff: Duration::from_millis(50),
            accept_poll: Duration::from_millis(20),
            write_timeout: Duration::from_millis(500),
            ..PublisherConfig::default()
        }
    }

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn start(
        endpoint: &Path,
        cache: &SnapshotCache,
    ) -> (PublisherStatus, StopSignal, std::thread::JoinHandle<()>) {
        let publisher = Publisher::new(endpoint, cache.clone()).with_config(fast_config());
        let status = publisher.status();
        let stop = StopSignal::new();
        let handle = {
            let stop = stop.clone();
            std::thread::spawn(move || publisher.run(&stop))
        };
        (status, stop, handle)
    }

    fn read_one(reader: &mut BufReader<IpcStream>) -> Snapshot {
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert!(line.ends_with('\n'));
        decode_record(line.as_bytes()).unwrap()
    }

    #[test]
    fn serves_latest_snapshot_to_reader() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = dir.path().join("pub.sock");
        let cache = SnapshotCache::new();
        cache.set(Snapshot::new("14:05", 37, 60, 55));

        let (status, stop, handle) = start(&endpoint, &cache);
        assert!(wait_for(|| status.state() == PublisherState::Listening));

        let stream = UnixDomainSocket::connect(&endpoint).unwrap();
        let mut reader = BufReader::new(stream);
        assert_eq!(read_one(&mut reader), Snapshot::new("14:05", 37, 60, 55));

        cache.set(Snapshot::new("14:06", 38, 60, 56));
        assert!(wait_for(|| read_one(&mut reader).time == "14:06"));
        assert_eq!(status.state(), PublisherState::Connected);

        stop.stop();
        handle.join().unwrap();
        assert_eq!(status.state(), PublisherState::Stopped);
        assert!(!endpoint.exists());
    }

    #[test]
    fn empty_cache_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = dir.path().join("empty.sock");
        let cache = SnapshotCache::new();

        let (status, stop, handle) = start(&endpoint, &cache);
        assert!(wait_for(|| status.state() == PublisherState::Listening));

        let stream = UnixDomainSocket::connect(&endpoint).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_millis(150)))
            .unwrap();
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        let err = reader.read_line(&mut line).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
        assert!(line.is_empty());

        stop.stop();
        handle.join().unwrap();
    }

    #[test]
    fn returns_to_listening_after_reader_disconnects() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = dir.path().join("again.sock");
        let cache = SnapshotCache::new();
        cache.set(Snapshot::new("09:00", 1, 2, 3));

        let (status, stop, handle) = start(&endpoint, &cache);
        assert!(wait_for(|| status.state() == PublisherState::Listening));

        let first = UnixDomainSocket::connect(&endpoint).unwrap();
        let mut first = BufReader::new(first);
        assert_eq!(read_one(&mut first).time, "09:00");
        drop(first);

        assert!(wait_for(|| status.sessions_served() == 1));
        assert!(wait_for(|| status.state() == PublisherState::Listening));

        let second = UnixDomainSocket::connect(&endpoint).unwrap();
        let mut second = BufReader::new(second);
        assert_eq!(read_one(&mut second).cpu_temp, 3);

        stop.stop();
        handle.join().unwrap();
    }

    #[test]
    fn bind_check_connections_are_not_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = dir.path().join("busy.sock");
        let cache = SnapshotCache::new();
        cache.set(Snapshot::new("10:10", 4, 5, 6));

        let (status, stop, handle) = start(&endpoint, &cache);
        assert!(wait_for(|| status.state() == PublisherState::Listening));

        for _ in 0..3 {
            assert!(probe_bind(&endpoint, 0o666).is_err());
        }
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(status.sessions_served(), 0);
        assert!(wait_for(|| status.state() == PublisherState::Listening));

        let reader = UnixDomainSocket::connect(&endpoint).unwrap();
        let mut reader = BufReader::new(reader);
        assert_eq!(read_one(&mut reader).time, "10:10");
        drop(reader);
        assert!(wait_for(|| status.sessions_served() == 1));

        stop.stop();
        handle.join().unwrap();
    }

    #[test]
    fn stalled_reader_fails_session_and_rebinds() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = dir.path().join("stall.sock");
        let cache = SnapshotCache::new();
        cache.set(Snapshot::new("x".repeat(1 << 20), 1, 1, 1));

        let publisher = Publisher::new(&endpoint, cache.clone()).with_config(PublisherConfig {
            publish_interval: Duration::from_millis(5),
            write_timeout: Duration::from_millis(50),
            ..fast_config()
        });
        let status = publisher.status();
        let stop = StopSignal::new();
        let handle = {
            let stop = stop.clone();
            std::thread::spawn(move || publisher.run(&stop))
        };
        assert!(wait_for(|| status.state() == PublisherState::Listening));

        let _stalled = UnixDomainSocket::connect(&endpoint).unwrap();
        assert!(wait_for(|| status.sessions_served() == 1));
        cache.set(Snapshot::new("11:11", 7, 8, 9));
        assert!(wait_for(|| status.state() == PublisherState::Listening));

        let fresh = UnixDomainSocket::connect(&endpoint).unwrap();
        let mut fresh = BufReader::new(fresh);
        assert_eq!(read_one(&mut fresh), Snapshot::new("11:11", 7, 8, 9));

        stop.stop();
        handle.join().unwrap();
    }

    #[test]
    fn second_reader_waits_for_first_to_leave() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = dir.path().join("queue.sock");
        let cache = SnapshotCache::new();
        cache.set(Snapshot::new("12:00", 1, 2, 3));

        let (status, stop, handle) = start(&endpoint, &cache);
        assert!(wait_for(|| status.state() == PublisherState::Listening));

        let first = UnixDomainSocket::connect(&endpoint).unwrap();
        let mut first = BufReader::new(first);
        assert_eq!(read_one(&mut first).time, "12:00");

        let second = UnixDomainSocket::connect(&endpoint).unwrap();
        second
            .set_read_timeout(Some(Duration::from_millis(150)))
            .unwrap();
        let mut second = BufReader::new(second);
        let mut line = String::new();
        let err = second.read_line(&mut line).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
        assert!(line.is_empty());
        assert_eq!(read_one(&mut first).time, "12:00");

        drop(first);
        second
            .get_ref()
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        assert_eq!(read_one(&mut second).time, "12:00");
        assert!(wait_for(|| status.sessions_served() == 1));

        stop.stop();
        handle.join().unwrap();
    }

    #[test]
    fn stop_unblocks_wait_for_reader() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = dir.path().join("idle.sock");
        let publisher = Publisher::new(&endpoint, SnapshotCache::new());
        let status = publisher.status();
        let stop = StopSignal::new();
        let handle = {
            let stop = stop.clone();
            std::thread::spawn(move || publisher.run(&stop))
        };

        assert!(wait_for(|| status.state() == PublisherState::Listening));
        let start = Instant::now();
        stop.stop();
        handle.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn bind_failure_backs_off_and_retries() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = dir.path().join("taken.sock");
        std::fs::write(&endpoint, b"not a socket").unwrap();

        let (status, stop, handle) = start(&endpoint, &SnapshotCache::new());
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(status.state(), PublisherState::Idle);

        std::fs::remove_file(&endpoint).unwrap();
        assert!(wait_for(|| status.state() == PublisherState::Listening));

        stop.stop();
        handle.join().unwrap();
    }

    #[test]
    fn probe_bind_reports_bad_path() {
        let err = probe_bind(Path::new("/nonexistent-dir/traymon.sock"), 0o666).unwrap_err();
        assert!(matches!(err, PipelineError::Transport(_)));
    }
}
