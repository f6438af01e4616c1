use log::{debug, error, info, warn};
use usbhost_interface::{DevDesc, IfDesc};

use crate::error::BindError;
use crate::host::{Child, UsbHost};
use crate::pipe::Pipes;

/// Interface class of CDC data interfaces.
pub const CDC_DATA_CLASS: u8 = 0x0A;

/// Whether the scan may switch the device between its configurations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Activation {
    /// Activate every configuration in turn.
    All,
    /// Somebody else holds the device, so only look at what is already active.
    CurrentOnly,
}

/// Finds the first bulk IN and the first bulk OUT endpoint on a CDC data interface and binds
/// a pipe to each.
///
/// Configurations are visited in ascending order. If either pipe is still missing afterwards,
/// any pipe that was bound is released again.
pub fn scan<H: UsbHost>(
    host: &mut H,
    dev_desc: &DevDesc,
    activation: Activation,
    pipes: &mut Pipes<H::Pipe>,
) -> Result<(), BindError> {
    if dev_desc.configurations == 0 {
        error!("device has no configurations");
        return Err(BindError::NoConfigurations);
    }

    let result = match activation {
        Activation::All => scan_all(host, dev_desc, pipes),
        Activation::CurrentOnly => {
            debug!("not activating configurations, scanning the current one");
            scan_children(host, pipes)
        }
    };
    if let Err(err) = result {
        pipes.release_all();
        return Err(err);
    }

    if !pipes.is_complete() {
        let err = BindError::MissingEndpoints {
            input: pipes.input().is_some(),
            output: pipes.output().is_some(),
        };
        error!("{}", err);
        pipes.release_all();
        return Err(err);
    }
    Ok(())
}

fn scan_all<H: UsbHost>(
    host: &mut H,
    dev_desc: &DevDesc,
    pipes: &mut Pipes<H::Pipe>,
) -> Result<(), BindError> {
    for index in 0..dev_desc.configurations {
        if pipes.is_complete() {
            break;
        }
        let conf_desc = match host.configuration_descriptor(index) {
            Ok(conf_desc) => conf_desc,
            Err(err) => {
                warn!("failed to read configuration {}: {}", index, err);
                continue;
            }
        };
        info!(
            "configuration {} (value {}): {} interfaces, attributes {:#04x}, max power {}",
            index,
            conf_desc.configuration_value,
            conf_desc.interface_descs.len(),
            conf_desc.attributes,
            conf_desc.max_power
        );
        if let Err(err) = host.set_configuration(conf_desc.configuration_value) {
            warn!(
                "failed to activate configuration {}: {}",
                conf_desc.configuration_value, err
            );
        }

        scan_children(host, pipes)?;
    }
    Ok(())
}

fn scan_children<H: UsbHost>(host: &mut H, pipes: &mut Pipes<H::Pipe>) -> Result<(), BindError> {
    let children = host.children().map_err(BindError::Interfaces)?;

    for child in children {
        let interface = match child {
            Child::Interface(interface) => interface,
            Child::Other(name) => {
                debug!("skipping child {}", name);
                continue;
            }
        };
        if interface.class != CDC_DATA_CLASS {
            debug!(
                "skipping interface {} of class {:#04x}",
                interface.number, interface.class
            );
            continue;
        }
        scan_interface(host, &interface, pipes);
    }
    Ok(())
}

fn scan_interface<H: UsbHost>(host: &mut H, interface: &IfDesc, pipes: &mut Pipes<H::Pipe>) {
    info!(
        "interface {}: {} endpoints, class {}.{}.{}",
        interface.number,
        interface.endpoints.len(),
        interface.class,
        interface.sub_class,
        interface.protocol
    );

    for endpoint in interface.endpoints.iter() {
        info!(
            "  endpoint {:#04x}: {:?}, max packet size {}, interval {}",
            endpoint.address,
            endpoint.ty(),
            endpoint.max_packet_size,
            endpoint.interval
        );
        if !endpoint.is_bulk() {
            continue;
        }
        let direction = match endpoint.binary_direction() {
            Some(direction) => direction,
            None => continue,
        };
        match pipes.bind(host, interface, direction, endpoint) {
            Ok(_) => (),
            Err(BindError::AlreadyBound { direction }) => debug!(
                "{:?} pipe already bound, ignoring endpoint {:#04x}",
                direction, endpoint.address
            ),
            Err(err) => error!("{}", err),
        }
    }
}
