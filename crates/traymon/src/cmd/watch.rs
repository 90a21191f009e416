use std::time::{Duration, Instant};

use traymon_frame::{RecordConfig, RecordReader};
use traymon_pipeline::StopSignal;
use traymon_transport::UnixDomainSocket;

use crate::cmd::{install_stop_handler, parse_duration, Context, WatchArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::print_snapshot;

const READ_POLL: Duration = Duration::from_millis(250);

pub fn run(args: WatchArgs, ctx: &Context) -> CliResult<i32> {
    let timeout = args.timeout.as_deref().map(parse_duration).transpose()?;

    let stream = UnixDomainSocket::connect(&ctx.endpoint)
        .map_err(|err| transport_error("connect failed", err))?;
    let interrupt = stream
        .try_clone()
        .map_err(|err| transport_error("connect failed", err))?;

    let stop = StopSignal::new();
    install_stop_handler(stop.clone(), move || {
        if let Err(err) = interrupt.shutdown() {
            tracing::debug!(error = %err, "failed to shut down watch stream");
        }
    })?;

    let config = RecordConfig {
        read_timeout: Some(READ_POLL),
        ..RecordConfig::default()
    };
    let mut reader = RecordReader::with_config_ipc(stream, config)
        .map_err(|err| frame_error("connect failed", err))?;

    let mut printed = 0usize;
    let mut last_record = Instant::now();

    while !stop.is_stopped() {
        match reader.read_record() {
            Ok(snapshot) => {
                print_snapshot(&snapshot, ctx.format);
                printed = printed.saturating_add(1);
                last_record = Instant::now();
                if args.count.is_some_and(|count| printed >= count) {
                    return Ok(SUCCESS);
                }
            }
            Err(err) if err.is_timeout() => {
                if let Some(limit) = timeout {
                    if last_record.elapsed() >= limit {
                        return Err(CliError::new(
                            TIMEOUT,
                            format!("no record received within {limit:?}"),
                        ));
                    }
                }
            }
            Err(err) if err.is_malformed() => {
                tracing::warn!(error = %err, "discarding malformed record");
            }
            Err(_) if stop.is_stopped() => break,
            Err(err) => return Err(frame_error("receive failed", err)),
        }
    }

    Ok(SUCCESS)
}
