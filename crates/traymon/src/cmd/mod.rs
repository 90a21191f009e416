use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use traymon_pipeline::{ForwarderConfig, StopSignal, UsbId};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod client;
pub mod ports;
pub mod service;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sample hardware sensors and publish them on the telemetry channel.
    Service(ServiceArgs),
    /// Read the telemetry channel and forward records to the display device.
    Client(ClientArgs),
    /// Print records received on the telemetry channel.
    Watch(WatchArgs),
    /// List serial ports and how they rank as display devices.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub format: OutputFormat,
    pub endpoint: PathBuf,
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Service(args) => service::run(args, ctx),
        Command::Client(args) => client::run(args, ctx),
        Command::Watch(args) => watch::run(args, ctx),
        Command::Ports(args) => ports::run(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServiceArgs {
    /// Sensor sampling interval (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub interval: String,
    /// Interval between records sent to a connected reader.
    #[arg(long, default_value = "1s")]
    pub publish_interval: String,
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    /// Serial line speed.
    #[arg(long, default_value_t = ForwarderConfig::DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Interval between records written to the device.
    #[arg(long, default_value = "1s")]
    pub period: String,
    /// Device rescan interval while a device is bound.
    #[arg(long, default_value = "10s")]
    pub rescan: String,
    /// Extra USB identity to treat as a display board (VID:PID, repeatable).
    #[arg(long = "usb-id", value_name = "VID:PID")]
    pub usb_ids: Vec<UsbId>,
    /// Only use ports matching a known identity or description.
    #[arg(long)]
    pub known_only: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Exit after receiving N records.
    #[arg(long)]
    pub count: Option<usize>,
    /// Give up if no record arrives within this time (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct PortsArgs {
    /// Extra USB identity to treat as a display board (VID:PID, repeatable).
    #[arg(long = "usb-id", value_name = "VID:PID")]
    pub usb_ids: Vec<UsbId>,
    /// Only list ports matching a known identity or description.
    #[arg(long)]
    pub known_only: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a duration such as `5s`, `250ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

/// Make Ctrl-C trigger `stop`, then run `on_stop`.
pub fn install_stop_handler(
    stop: StopSignal,
    on_stop: impl Fn() + Send + 'static,
) -> CliResult<()> {
    ctrlc::set_handler(move || {
        tracing::info!("stop requested");
        stop.stop();
        on_stop();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Join a component thread, reporting a panic as an internal error.
pub fn join_component(name: &str, handle: std::thread::JoinHandle<()>) -> CliResult<()> {
    handle
        .join()
        .map_err(|_| CliError::new(INTERNAL, format!("{name} thread panicked")))
}

/// Spawn a named component thread.
pub fn spawn_component(
    name: &str,
    stop: &StopSignal,
    body: impl FnOnce(&StopSignal) + Send + 'static,
) -> CliResult<std::thread::JoinHandle<()>> {
    let stop = stop.clone();
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || body(&stop))
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start {name}: {err}")))
}
