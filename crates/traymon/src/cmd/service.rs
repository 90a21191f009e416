use std::io::ErrorKind;

use traymon_pipeline::{
    probe_bind, PipelineError, Publisher, PublisherConfig, Sampler, SamplerConfig, SnapshotCache,
    StopSignal, SystemSensors,
};

use crate::cmd::{
    install_stop_handler, join_component, parse_duration, spawn_component, Context, ServiceArgs,
};
use crate::exit::{pipeline_error, CliResult, SUCCESS};

pub fn run(args: ServiceArgs, ctx: &Context) -> CliResult<i32> {
    let sampler_config = SamplerConfig {
        interval: parse_duration(&args.interval)?,
    };
    let publisher_config = PublisherConfig {
        publish_interval: parse_duration(&args.publish_interval)?,
        ..PublisherConfig::default()
    };

    // A second service on the same endpoint is a hard error; anything else
    // is left to the publisher's rebind loop.
    if let Err(err) = probe_bind(&ctx.endpoint, publisher_config.socket_mode) {
        if is_addr_in_use(&err) {
            return Err(pipeline_error("telemetry endpoint already served", err));
        }
        tracing::warn!(error = %err, "telemetry endpoint not bindable yet");
    }

    let cache = SnapshotCache::new();
    let sampler = Sampler::new(SystemSensors::new(), cache.clone()).with_config(sampler_config);
    let publisher = Publisher::new(&ctx.endpoint, cache).with_config(publisher_config);

    let stop = StopSignal::new();
    install_stop_handler(stop.clone(), || {})?;

    tracing::info!(endpoint = ?ctx.endpoint, "service starting");
    let sampler = spawn_component("sampler", &stop, move |stop| sampler.run(stop))?;
    let publisher = match spawn_component("publisher", &stop, move |stop| publisher.run(stop)) {
        Ok(handle) => handle,
        Err(err) => {
            stop.stop();
            join_component("sampler", sampler)?;
            return Err(err);
        }
    };

    join_component("publisher", publisher)?;
    join_component("sampler", sampler)?;
    tracing::info!("service stopped");
    Ok(SUCCESS)
}

fn is_addr_in_use(err: &PipelineError) -> bool {
    matches!(
        err,
        PipelineError::Transport(err)
            if err.io_source().map(std::io::Error::kind) == Some(ErrorKind::AddrInUse)
    )
}
