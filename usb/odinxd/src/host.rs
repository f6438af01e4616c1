//! The seams between the driver core and whatever hosts it.

use usbhost_interface::{ConfDesc, DevDesc, EndpBinaryDirection, EndpDesc, IfDesc};

use crate::buffer::DmaBuffer;
use crate::dispatch::CompletionContext;
use crate::error::HostError;

/// Size of each transfer buffer.
pub const PAGE_SIZE: usize = 4096;

/// Outcome of an asynchronous transfer, as reported by the host.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TransferStatus {
    Success,
    /// The device ended the transfer before the requested length.
    ShortPacket,
    Stalled,
    /// The pipe was aborted while the transfer was outstanding.
    Aborted,
    Error,
}

impl TransferStatus {
    /// Whether the buffer contents are meaningful for this outcome.
    pub fn carries_data(self) -> bool {
        matches!(self, Self::Success | Self::ShortPacket)
    }
}

/// A child of a configured device.
#[derive(Clone, Debug)]
pub enum Child {
    Interface(IfDesc),
    Other(String),
}

/// The object a driver is offered during matching.
#[derive(Debug)]
pub enum Provider<D> {
    UsbDevice(D),
    UsbInterface(IfDesc),
    Other(&'static str),
}

impl<D> Provider<D> {
    pub fn as_usb_device(&self) -> Option<&D> {
        match self {
            Self::UsbDevice(device) => Some(device),
            _ => None,
        }
    }
    pub fn into_usb_device(self) -> Result<D, &'static str> {
        match self {
            Self::UsbDevice(device) => Ok(device),
            other => Err(other.kind()),
        }
    }
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UsbDevice(_) => "usb device",
            Self::UsbInterface(_) => "usb interface",
            Self::Other(kind) => kind,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProbeResult {
    Accept,
    Reject,
}

/// A USB device as seen through the host's primitives.
pub trait UsbHost {
    type Pipe: Pipe;

    fn is_open(&self) -> bool;
    /// Opens the device for exclusive use. `HostError::ExclusiveAccess` means another client
    /// already holds it.
    fn open(&mut self) -> Result<(), HostError>;
    fn close(&mut self);

    fn device_descriptor(&self) -> Result<DevDesc, HostError>;
    /// Reads the configuration at `index`, which counts from zero and is not the
    /// bConfigurationValue.
    fn configuration_descriptor(&self, index: u8) -> Result<ConfDesc, HostError>;
    fn set_configuration(&mut self, value: u8) -> Result<(), HostError>;
    /// Lists the children of the active configuration.
    fn children(&self) -> Result<Vec<Child>, HostError>;
    fn string_descriptor(&self, index: u8) -> Result<String, HostError>;

    /// Opens a pipe for `endpoint` of `interface`.
    fn copy_pipe(
        &mut self,
        interface: &IfDesc,
        endpoint: &EndpDesc,
    ) -> Result<Self::Pipe, HostError>;
}

pub trait Pipe {
    fn address(&self) -> u8;

    /// Queues a transfer of up to `length` bytes through `buffer` and returns without waiting.
    /// On `Ok`, `context` is completed exactly once, possibly from another thread. On `Err`,
    /// it must not be completed.
    fn io(
        &self,
        buffer: &DmaBuffer,
        length: usize,
        context: CompletionContext,
    ) -> Result<(), HostError>;

    /// Cancels any outstanding transfer. Its completion is either reported as
    /// `TransferStatus::Aborted` or never delivered.
    fn abort(&self);
}

pub trait BufferAllocator {
    fn alloc(&self, direction: EndpBinaryDirection, capacity: usize)
        -> Result<DmaBuffer, HostError>;
}

/// Allocates transfer buffers on the heap.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapAllocator;

impl BufferAllocator for HeapAllocator {
    fn alloc(
        &self,
        direction: EndpBinaryDirection,
        capacity: usize,
    ) -> Result<DmaBuffer, HostError> {
        Ok(DmaBuffer::new(direction, capacity))
    }
}
