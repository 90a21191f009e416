//! Newline-delimited JSON telemetry records.
//!
//! Every message on the telemetry channel, and every line written to the
//! display device, is one compact JSON object followed by `\n`:
//!
//! ```text
//! {"time":"14:05","cpu_load":37,"volume":60,"cpu_temp":55}
//! ```
//!
//! There is no length prefix. [`RecordReader`] reassembles lines across
//! partial reads and read timeouts; [`RecordWriter`] writes whole lines.

pub mod codec;
pub mod error;
pub mod reader;
pub mod snapshot;
pub mod writer;

pub use codec::{
    decode_record, encode_record, split_line, to_line, RecordConfig, DEFAULT_MAX_RECORD,
    RECORD_DELIMITER,
};
pub use error::{FrameError, Result};
pub use reader::RecordReader;
pub use snapshot::Snapshot;
pub use writer::RecordWriter;
