use traymon_pipeline::{DeviceDiscovery, SerialPortEnumerator};

use crate::cmd::client::build_matcher;
use crate::cmd::{Context, PortsArgs};
use crate::exit::{discovery_error, CliResult, SUCCESS};
use crate::output::print_ports;

pub fn run(args: PortsArgs, ctx: &Context) -> CliResult<i32> {
    let discovery = DeviceDiscovery::new(SerialPortEnumerator)
        .with_matcher(build_matcher(args.usb_ids, args.known_only));
    let ranked = discovery
        .ranked()
        .map_err(|err| discovery_error("port enumeration failed", err))?;

    tracing::debug!(ports = ranked.len(), "enumerated serial ports");
    print_ports(&ranked, ctx.format);
    Ok(SUCCESS)
}
