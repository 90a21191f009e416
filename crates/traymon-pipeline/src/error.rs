use std::io::ErrorKind;

use traymon_frame::FrameError;
use traymon_transport::TransportError;

/// Errors that can occur while moving telemetry through the pipeline.
///
/// None of these leave their owning loop; they decide between
/// "peer went away" and "something broke" teardown paths.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Record-level error.
    #[error("record error: {0}")]
    Frame(#[from] FrameError),

    /// Opening the output device failed.
    #[error("failed to open device {path}: {source}")]
    DeviceOpen {
        path: String,
        source: std::io::Error,
    },

    /// Writing to the output device failed.
    #[error("failed to write to device {path}: {source}")]
    DeviceWrite { path: String, source: FrameError },
}

impl PipelineError {
    /// True when the failure means the other side simply disconnected.
    pub fn is_disconnect(&self) -> bool {
        match self {
            PipelineError::Frame(FrameError::ConnectionClosed)
            | PipelineError::DeviceWrite {
                source: FrameError::ConnectionClosed,
                ..
            } => true,
            PipelineError::Frame(FrameError::Io(err))
            | PipelineError::DeviceWrite {
                source: FrameError::Io(err),
                ..
            } => is_disconnect_kind(err.kind()),
            PipelineError::Transport(err) => err
                .io_source()
                .map(|err| is_disconnect_kind(err.kind()))
                .unwrap_or(false),
            _ => false,
        }
    }
}

fn is_disconnect_kind(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
    )
}

/// Errors from enumerating candidate devices.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The serial port backend could not list ports.
    #[error("serial port enumeration failed: {0}")]
    Enumerate(#[from] serialport::Error),

    /// Any other enumeration backend failure.
    #[error("device enumeration failed: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
