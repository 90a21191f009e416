use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::debug;
use traymon_transport::IpcStream;

use crate::codec::{decode_record, split_line, RecordConfig};
use crate::error::{FrameError, Result};
use crate::snapshot::Snapshot;

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 1024;

/// Reads newline-delimited records from any `Read` stream.
///
/// Partial lines stay buffered across calls, including calls that end in a
/// read timeout, so callers can poll with a short timeout without losing data.
pub struct RecordReader<T> {
    inner: T,
    buf: BytesMut,
    config: RecordConfig,
}

impl<T: Read> RecordReader<T> {
    /// Create a new record reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, RecordConfig::default())
    }

    /// Create a new record reader with explicit configuration.
    pub fn with_config(inner: T, config: RecordConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete line, without its newline (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` at EOF; a trailing partial
    /// line is discarded.
    pub fn read_line(&mut self) -> Result<BytesMut> {
        loop {
            if let Some(line) = split_line(&mut self.buf, self.config.max_record_size)? {
                return Ok(line);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if !self.buf.is_empty() {
                    debug!(discarded = self.buf.len(), "connection closed mid-record");
                }
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read and decode the next record (blocking).
    ///
    /// A malformed line is consumed before its error is returned, so the
    /// next call continues with the following line.
    pub fn read_record(&mut self) -> Result<Snapshot> {
        let line = self.read_line()?;
        decode_record(&line)
    }

    /// Bytes received but not yet returned as a line.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

impl RecordReader<IpcStream> {
    /// Create a record reader for `IpcStream` and apply read timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: RecordConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: traymon_transport::TransportError) -> FrameError {
    match err {
        traymon_transport::TransportError::Io(io)
        | traymon_transport::TransportError::Accept(io) => FrameError::Io(io),
        traymon_transport::TransportError::Bind { source, .. }
        | traymon_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;

    const LINE: &[u8] = b"{\"time\":\"14:05\",\"cpu_load\":37,\"volume\":60,\"cpu_temp\":55}\n";

    #[test]
    fn read_single_record() {
        let mut reader = RecordReader::new(Cursor::new(LINE.to_vec()));
        let snapshot = reader.read_record().unwrap();
        assert_eq!(snapshot, Snapshot::new("14:05", 37, 60, 55));
    }

    #[test]
    fn read_multiple_records_in_order() {
        let wire = b"{\"time\":\"10:00\",\"cpu_load\":1,\"volume\":0,\"cpu_temp\":0}\n\
{\"time\":\"10:01\",\"cpu_load\":2,\"volume\":0,\"cpu_temp\":0}\n";
        let mut reader = RecordReader::new(Cursor::new(wire.to_vec()));

        assert_eq!(reader.read_record().unwrap().time, "10:00");
        assert_eq!(reader.read_record().unwrap().time, "10:01");
        assert!(matches!(
            reader.read_record(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: LINE.to_vec(),
            pos: 0,
        };
        let mut reader = RecordReader::new(byte_reader);
        assert_eq!(reader.read_record().unwrap().cpu_load, 37);
    }

    #[test]
    fn malformed_line_does_not_poison_stream() {
        let mut wire = b"garbage\n".to_vec();
        wire.extend_from_slice(LINE);
        let mut reader = RecordReader::new(Cursor::new(wire));

        let err = reader.read_record().unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(reader.read_record().unwrap().volume, 60);
    }

    #[test]
    fn connection_closed_mid_record() {
        let mut reader = RecordReader::new(Cursor::new(b"{\"time\":".to_vec()));
        assert!(matches!(
            reader.read_line(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn oversized_record_in_stream() {
        let cfg = RecordConfig {
            max_record_size: 16,
            ..RecordConfig::default()
        };
        let mut reader = RecordReader::with_config(Cursor::new(vec![b'a'; 64]), cfg);
        assert!(matches!(
            reader.read_line(),
            Err(FrameError::RecordTooLarge { .. })
        ));
    }

    #[test]
    fn timeout_keeps_partial_line() {
        let reader = TimeoutBetweenHalves {
            halves: vec![LINE[..10].to_vec(), LINE[10..].to_vec()],
            timed_out: false,
        };
        let mut framed = RecordReader::new(reader);

        let err = framed.read_record().unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(framed.buffered(), 10);

        let snapshot = framed.read_record().unwrap();
        assert_eq!(snapshot.cpu_temp, 55);
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(LINE.to_vec()),
        };
        let mut framed = RecordReader::new(reader);
        assert_eq!(framed.read_record().unwrap().time, "14:05");
    }

    #[test]
    fn read_over_ipc_pair() {
        let (mut left, right) = IpcStream::pair().unwrap();
        let cfg = RecordConfig {
            read_timeout: Some(std::time::Duration::from_millis(500)),
            ..RecordConfig::default()
        };
        let mut reader = RecordReader::with_config_ipc(right, cfg).unwrap();

        left.write_all(LINE).unwrap();
        assert_eq!(reader.read_record().unwrap().cpu_load, 37);
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct TimeoutBetweenHalves {
        halves: Vec<Vec<u8>>,
        timed_out: bool,
    }

    impl Read for TimeoutBetweenHalves {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.halves.len() == 1 && !self.timed_out {
                self.timed_out = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            if self.halves.is_empty() {
                return Ok(0);
            }
            let half = self.halves.remove(0);
            buf[..half.len()].copy_from_slice(&half);
            Ok(half.len())
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
