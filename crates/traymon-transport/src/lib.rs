//! Local IPC endpoint for the traymon telemetry channel.
//!
//! The channel is a single well-known rendezvous point ([`DEFAULT_ENDPOINT_NAME`])
//! owned by one publisher at a time:
//! - Unix domain sockets (Linux/macOS)
//!
//! This is the lowest layer of traymon. Record framing and the
//! publisher/subscriber loops build on the [`IpcStream`] type provided here.

pub mod endpoint;
pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{resolve_endpoint, DEFAULT_ENDPOINT_NAME};
pub use error::{Result, TransportError};
pub use traits::IpcStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
