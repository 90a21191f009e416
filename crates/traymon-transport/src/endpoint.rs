//! Well-known endpoint naming.

use std::path::PathBuf;

use crate::error::{Result, TransportError};

/// Name of the telemetry channel shared by the service and its readers.
pub const DEFAULT_ENDPOINT_NAME: &str = "TrayHardwareMonitor";

const SOCKET_SUFFIX: &str = ".sock";

/// Resolve an endpoint name to a socket path.
///
/// A bare name maps to `<temp dir>/<name>.sock`, which is the same location
/// for the privileged service and an unprivileged reader. Anything that
/// contains a path separator is taken as a literal socket path.
pub fn resolve_endpoint(name: &str) -> Result<PathBuf> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TransportError::InvalidEndpoint(name.to_string()));
    }

    if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
        return Ok(PathBuf::from(name));
    }

    Ok(std::env::temp_dir().join(format!("{name}{SOCKET_SUFFIX}")))
}
