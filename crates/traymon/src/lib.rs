//! Hardware telemetry relay.
//!
//! A privileged service samples CPU load, CPU temperature and output volume
//! and publishes them on a local channel; an unprivileged client reads the
//! channel and forwards each record to a USB-serial display board.
//!
//! # Crate Structure
//!
//! - [`transport`]: Unix domain socket endpoint and stream
//! - [`frame`]: Newline-delimited JSON records
//! - [`pipeline`]: Sampler, publisher, subscriber, discovery and forwarder

/// Re-export transport types.
pub mod transport {
    pub use traymon_transport::*;
}

/// Re-export record types.
pub mod frame {
    pub use traymon_frame::*;
}

/// Re-export pipeline components.
pub mod pipeline {
    pub use traymon_pipeline::*;
}
