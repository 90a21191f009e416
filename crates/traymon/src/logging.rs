use std::cmp;

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Targets that follow `--log-level`. Everything else stays at warn or quieter.
const OWN_TARGETS: [&str; 4] = [
    "traymon",
    "traymon_frame",
    "traymon_pipeline",
    "traymon_transport",
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

fn log_targets(level: LogLevel) -> Targets {
    let own = level.as_filter();
    OWN_TARGETS.iter().fold(
        Targets::new().with_default(cmp::min(own, LevelFilter::WARN)),
        |targets, name| targets.with_target(*name, own),
    )
}

/// Install the global subscriber on stderr, tagging lines with the
/// component thread that wrote them.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true);
    let registry = tracing_subscriber::registry().with(log_targets(level));

    let installed = match format {
        LogFormat::Text => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
    if let Err(err) = installed {
        eprintln!("warning: logging already initialized: {err}");
    }
}
