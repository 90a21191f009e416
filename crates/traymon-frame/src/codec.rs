use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::snapshot::Snapshot;

/// Record terminator.
pub const RECORD_DELIMITER: u8 = b'\n';

/// Default maximum record size: 4 KiB. A real record is under 100 bytes.
pub const DEFAULT_MAX_RECORD: usize = 4 * 1024;

/// Encode a snapshot as one wire line.
///
/// Wire format:
/// ```text
/// {"time":"HH:MM","cpu_load":N,"volume":N,"cpu_temp":N}\n
/// ```
///
/// JSON string escaping guarantees the body never contains a raw newline.
pub fn encode_record(snapshot: &Snapshot, dst: &mut BytesMut) -> Result<()> {
    serde_json::to_writer((&mut *dst).writer(), snapshot)?;
    dst.put_u8(RECORD_DELIMITER);
    Ok(())
}

/// Encode a snapshot as an owned line, newline included.
pub fn to_line(snapshot: &Snapshot) -> Result<String> {
    let mut line = serde_json::to_string(snapshot)?;
    line.push(RECORD_DELIMITER as char);
    Ok(line)
}

/// Decode one line (without its newline) into a snapshot.
///
/// Surrounding whitespace and a trailing `\r` are ignored, unknown fields
/// are tolerated, percentages above 100 are rejected.
pub fn decode_record(line: &[u8]) -> Result<Snapshot> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Err(FrameError::Empty);
    }

    let snapshot: Snapshot = serde_json::from_slice(line)?;
    for (field, value) in [("cpu_load", snapshot.cpu_load), ("volume", snapshot.volume)] {
        if value > Snapshot::MAX_PERCENT {
            return Err(FrameError::OutOfRange { field, value });
        }
    }
    Ok(snapshot)
}

/// Split the next complete line off the front of `src`.
///
/// Returns `Ok(None)` if no newline has arrived yet. On success the line is
/// consumed from the buffer and returned without its delimiter.
pub fn split_line(src: &mut BytesMut, max_record: usize) -> Result<Option<BytesMut>> {
    match src.iter().position(|b| *b == RECORD_DELIMITER) {
        Some(pos) => {
            let mut line = src.split_to(pos + 1);
            line.truncate(pos);
            Ok(Some(line))
        }
        None if src.len() > max_record => Err(FrameError::RecordTooLarge {
            size: src.len(),
            max: max_record,
        }),
        None => Ok(None),
    }
}

/// Configuration for record readers and writers.
#[derive(Debug, Clone)]
pub struct RecordConfig {
    /// Maximum bytes buffered while waiting for a newline. Default: 4 KiB.
    pub max_record_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for RecordConfig {
    fn default() -> Self {
        Self {
            max_record_size: DEFAULT_MAX_RECORD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
