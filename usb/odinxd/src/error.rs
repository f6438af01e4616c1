use std::io;

use thiserror::Error;
use usbhost_interface::{DescError, UsbClientHandleError};

use crate::buffer::BufferSlot;

/// A failure reported by the host side of the driver.
#[derive(Debug, Error)]
pub enum HostError {
    /// Another client already holds the device exclusively.
    #[error("device is exclusively held by another client")]
    ExclusiveAccess,

    #[error("device is not open")]
    NotOpen,

    #[error("no endpoint with address {0:#04x}")]
    InvalidEndpoint(u8),

    #[error("a transfer is already outstanding")]
    Busy,

    #[error("pipe was aborted")]
    Aborted,

    #[error("host refused the request: {0}")]
    Refused(&'static str),

    #[error("usb client error: {0}")]
    Client(#[from] UsbClientHandleError),

    #[error("malformed descriptor: {0}")]
    Descriptor(#[from] DescError),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("{slot:?} buffer already has an outstanding transfer")]
    Busy { slot: BufferSlot },

    #[error("transfer of {length} bytes exceeds the {capacity} byte {slot:?} buffer")]
    TooLong {
        slot: BufferSlot,
        length: usize,
        capacity: usize,
    },

    #[error("driver is torn down")]
    TornDown,

    #[error("pipe rejected the transfer: {0}")]
    Pipe(#[source] HostError),
}

/// A fatal failure while binding the driver to a device.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("provider is not a usb device (found {0})")]
    NotUsbDevice(&'static str),

    #[error("driver was not initialized")]
    NotInitialized,

    #[error("driver is in state {0:?}, cannot start")]
    InvalidState(crate::driver::DriverState),

    #[error("failed to open device: {0}")]
    Open(#[source] HostError),

    #[error("failed to read descriptors: {0}")]
    Descriptor(#[source] HostError),

    #[error("device has no configurations")]
    NoConfigurations,

    #[error("failed to enumerate interfaces: {0}")]
    Interfaces(#[source] HostError),

    #[error("missing bulk endpoints (in: {input}, out: {output})")]
    MissingEndpoints { input: bool, output: bool },

    #[error("endpoint {address:#04x} has the wrong direction")]
    WrongDirection { address: u8 },

    #[error("{direction:?} pipe is already bound")]
    AlreadyBound {
        direction: usbhost_interface::EndpBinaryDirection,
    },

    #[error("failed to open pipe {address:#04x}: {source}")]
    Pipe {
        address: u8,
        #[source]
        source: HostError,
    },

    #[error("failed to allocate transfer buffer: {0}")]
    Buffer(#[source] HostError),

    #[error("failed to submit transfer: {0}")]
    Submit(#[from] SubmitError),
}
