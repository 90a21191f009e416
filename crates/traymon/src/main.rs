mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;
use traymon_transport::{resolve_endpoint, DEFAULT_ENDPOINT_NAME};

use crate::cmd::{Command, Context};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "traymon", version, about = "Hardware telemetry relay")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Telemetry channel name, or a socket path.
    #[arg(
        long,
        value_name = "NAME",
        env = "TRAYMON_ENDPOINT",
        default_value = DEFAULT_ENDPOINT_NAME,
        global = true
    )]
    endpoint: String,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let result = resolve_endpoint(&cli.endpoint)
        .map_err(|err| exit::transport_error("invalid endpoint", err))
        .and_then(|endpoint| {
            let ctx = Context {
                format: cli.format.unwrap_or_else(OutputFormat::default_for_stdout),
                endpoint,
            };
            cmd::run(cli.command, &ctx)
        });

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
