use std::{env, process, time::Duration};

use crossbeam_channel::{select, tick, unbounded};
use log::{debug, error, info, warn};
use odinx::scheme::SchemeHost;
use odinx::{matching, DriverEvent, HeapAllocator, OdinDriver, ProbeResult, Provider};
use usbhost_interface::{PortState, UsbClientHandle};

const USAGE: &str = "odinxd <scheme> <port>";

/// How often the port is checked for a detached device.
const PORT_POLL_INTERVAL: Duration = Duration::from_secs(1);

fn main() {
    let mut args = env::args().skip(1);

    let (scheme, port) = match (args.next(), args.next().map(|port| port.parse::<usize>())) {
        (Some(scheme), Some(Ok(port))) => (scheme, port),
        _ => {
            eprintln!("usage: {}", USAGE);
            process::exit(2);
        }
    };

    let name = format!("{}_{}_odin", scheme, port);
    common::setup_logging("usb", "device", &name, common::output_level());

    info!("ODIN driver spawned with scheme `{}`, port {}", scheme, port);

    if let Err(err) = run(scheme, port) {
        error!("{}", err);
        process::exit(1);
    }
}

fn run(scheme: String, port: usize) -> Result<(), Box<dyn std::error::Error>> {
    let handle = UsbClientHandle::new(scheme, port);
    let dev_desc = handle.device_descriptor()?;

    match matching::lookup(dev_desc.vendor, dev_desc.product) {
        Some(entry) => info!("matched {}", entry.name),
        None => {
            info!(
                "device {:04x}:{:04x} is not in download mode, not binding",
                dev_desc.vendor, dev_desc.product
            );
            return Ok(());
        }
    }

    let (events_tx, events_rx) = unbounded();
    let mut driver = OdinDriver::<SchemeHost>::init_with_events(&HeapAllocator, events_tx)?;

    let provider = Provider::UsbDevice(SchemeHost::new(handle.clone()));
    if driver.probe(&provider, 0) == ProbeResult::Reject {
        return Ok(());
    }
    driver.attach(&provider);
    driver.start(provider)?;

    let ticker = tick(PORT_POLL_INTERVAL);
    loop {
        select! {
            recv(events_rx) -> event => match event {
                Ok(DriverEvent::HandshakeComplete) => info!("device is ready"),
                Ok(event) => debug!("{:?}", event),
                Err(_) => break,
            },
            recv(ticker) -> _ => match handle.port_state() {
                Ok(PortState::EnabledOrDisabled) => {
                    info!("device detached");
                    break;
                }
                Ok(_) => (),
                Err(err) => {
                    warn!("failed to read port state, assuming detached: {}", err);
                    break;
                }
            },
        }
    }

    driver.stop();
    driver.detach(&Provider::Other("port"));
    driver.free();
    Ok(())
}
