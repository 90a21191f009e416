use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use traymon_transport::IpcStream;

use crate::codec::{encode_record, RecordConfig};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;
use crate::snapshot::Snapshot;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes whole records to any `Write` stream.
///
/// A write that hits the stream's write timeout fails with an I/O error of
/// kind `WouldBlock`/`TimedOut` rather than retrying.
pub struct RecordWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> RecordWriter<T> {
    /// Create a new record writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and send one snapshot as a line.
    pub fn send(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.buf.clear();
        encode_record(snapshot, &mut self.buf)?;

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl RecordWriter<IpcStream> {
    /// Create a record writer for `IpcStream` and apply write timeout from config.
    pub fn with_config_ipc(inner: IpcStream, config: &RecordConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::new(inner))
    }
}
