use std::time::Duration;

use traymon_pipeline::{
    DeviceDiscovery, DeviceMatcher, Forwarder, ForwarderConfig, ForwarderStatus,
    SerialDeviceOpener, SerialPortEnumerator, SnapshotCache, StopSignal, Subscriber,
    SubscriberHandle, UsbId,
};

use crate::cmd::{
    install_stop_handler, join_component, parse_duration, spawn_component, ClientArgs, Context,
};
use crate::exit::{CliResult, SUCCESS};

const STATUS_INTERVAL: Duration = Duration::from_secs(2);

pub fn run(args: ClientArgs, ctx: &Context) -> CliResult<i32> {
    let config = ForwarderConfig {
        period: parse_duration(&args.period)?,
        rescan_interval: parse_duration(&args.rescan)?,
        baud_rate: args.baud,
        ..ForwarderConfig::default()
    };
    let matcher = build_matcher(args.usb_ids, args.known_only);

    let cache = SnapshotCache::new();
    let subscriber = Subscriber::new(&ctx.endpoint, cache.clone());
    let handle = subscriber.handle();

    let forwarder = Forwarder::new(
        DeviceDiscovery::new(SerialPortEnumerator).with_matcher(matcher),
        SerialDeviceOpener::from_config(&config),
        cache,
    )
    .with_config(config)
    .with_link(handle.clone());
    let status = forwarder.status();

    let stop = StopSignal::new();
    {
        let handle = handle.clone();
        install_stop_handler(stop.clone(), move || handle.interrupt())?;
    }

    tracing::info!(endpoint = ?ctx.endpoint, "client starting");
    let subscriber = spawn_component("subscriber", &stop, move |stop| subscriber.run(stop))?;
    let forwarder = match spawn_component("forwarder", &stop, move |stop| forwarder.run(stop)) {
        Ok(thread) => thread,
        Err(err) => {
            handle.stop(&stop);
            join_component("subscriber", subscriber)?;
            return Err(err);
        }
    };

    report_status(&handle, &status, &stop);

    join_component("forwarder", forwarder)?;
    join_component("subscriber", subscriber)?;
    tracing::info!("client stopped");
    Ok(SUCCESS)
}

pub(crate) fn build_matcher(usb_ids: Vec<UsbId>, known_only: bool) -> DeviceMatcher {
    let mut matcher = DeviceMatcher::default();
    for id in usb_ids {
        if !matcher.identities.contains(&id) {
            matcher.identities.push(id);
        }
    }
    matcher.accept_any = !known_only;
    matcher
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ClientStatus {
    channel_connected: bool,
    device: Option<String>,
}

impl ClientStatus {
    fn current(handle: &SubscriberHandle, status: &ForwarderStatus) -> Self {
        Self {
            channel_connected: handle.is_connected(),
            device: status.bound_device(),
        }
    }
}

/// Log the channel and device state whenever it changes, until stopped.
fn report_status(handle: &SubscriberHandle, status: &ForwarderStatus, stop: &StopSignal) {
    let mut last: Option<ClientStatus> = None;
    loop {
        let current = ClientStatus::current(handle, status);
        if last.as_ref() != Some(&current) {
            tracing::info!(
                channel = if current.channel_connected { "connected" } else { "disconnected" },
                device = current.device.as_deref().unwrap_or("none"),
                records_sent = status.records_sent(),
                "client status"
            );
            last = Some(current);
        }
        if stop.wait_timeout(STATUS_INTERVAL) {
            break;
        }
    }
}
