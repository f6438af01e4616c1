use std::sync::Arc;

use crossbeam_channel::Sender;
use log::{debug, error, info, warn};
use usbhost_interface::DevDesc;

use crate::buffer::{BufferSlot, TransferBuffers};
use crate::dispatch::{Dispatcher, DriverEvent};
use crate::error::{BindError, HostError};
use crate::handshake::{send_probe, Handshake, HandshakeState};
use crate::host::{BufferAllocator, ProbeResult, Provider, UsbHost};
use crate::pipe::Pipes;
use crate::scan::{scan, Activation};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DriverState {
    Unbound,
    Attached,
    Configured,
    Scanning,
    PipesBound,
    Handshaking,
    Running,
    Stopped,
}

/// Drives one device from matching to a completed handshake.
pub struct OdinDriver<H: UsbHost> {
    state: DriverState,
    device: Option<H>,
    opened_device: bool,
    pipes: Pipes<H::Pipe>,
    handshake: Arc<Handshake>,
    dispatcher: Option<Arc<Dispatcher>>,
}

impl<H: UsbHost> OdinDriver<H> {
    pub fn init(alloc: &dyn BufferAllocator) -> Result<Self, BindError> {
        Self::init_inner(alloc, None)
    }

    /// Like `init`, but reports handshake progress and transfer completions on `events`.
    pub fn init_with_events(
        alloc: &dyn BufferAllocator,
        events: Sender<DriverEvent>,
    ) -> Result<Self, BindError> {
        Self::init_inner(alloc, Some(events))
    }

    fn init_inner(
        alloc: &dyn BufferAllocator,
        events: Option<Sender<DriverEvent>>,
    ) -> Result<Self, BindError> {
        info!("SAMSUNG ODIN Mode Driver");
        let buffers = TransferBuffers::allocate(alloc).map_err(BindError::Buffer)?;
        let handshake = Arc::new(Handshake::new());

        Ok(Self {
            state: DriverState::Unbound,
            device: None,
            opened_device: false,
            pipes: Pipes::new(),
            dispatcher: Some(Arc::new(Dispatcher::new(
                buffers,
                Arc::clone(&handshake),
                events,
            ))),
            handshake,
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }
    pub fn handshake_state(&self) -> HandshakeState {
        self.handshake.state()
    }
    pub fn device(&self) -> Option<&H> {
        self.device.as_ref()
    }
    pub fn in_pipe(&self) -> Option<&H::Pipe> {
        self.pipes.input()
    }
    pub fn out_pipe(&self) -> Option<&H::Pipe> {
        self.pipes.output()
    }
    pub fn dispatcher(&self) -> Option<&Arc<Dispatcher>> {
        self.dispatcher.as_ref()
    }

    pub fn probe(&self, provider: &Provider<H>, score: i32) -> ProbeResult {
        debug!("probe: {} with score {}", provider.kind(), score);
        match provider.as_usb_device() {
            Some(_) => ProbeResult::Accept,
            None => {
                debug!("rejecting provider of kind {}", provider.kind());
                ProbeResult::Reject
            }
        }
    }

    pub fn attach(&mut self, provider: &Provider<H>) -> bool {
        info!("attach: {}", provider.kind());
        if self.state == DriverState::Unbound {
            self.state = DriverState::Attached;
        }
        true
    }

    /// Binds to the device and queues the handshake. Returns once the probe is queued; the
    /// reply is handled by the dispatcher whenever it arrives.
    ///
    /// On failure everything acquired so far is released again and the driver is left
    /// `Attached`.
    pub fn start(&mut self, provider: Provider<H>) -> Result<(), BindError> {
        match self.state {
            DriverState::Unbound | DriverState::Attached => (),
            state => return Err(BindError::InvalidState(state)),
        }
        let device = provider.into_usb_device().map_err(|kind| {
            error!("start: provider is a {}, not a usb device", kind);
            BindError::NotUsbDevice(kind)
        })?;
        self.device = Some(device);

        match self.bind() {
            Ok(()) => {
                self.state = DriverState::Running;
                info!("started, waiting for the handshake reply");
                Ok(())
            }
            Err(err) => {
                error!("start failed: {}", err);
                self.pipes.release_all();
                self.release_device();
                self.state = DriverState::Attached;
                Err(err)
            }
        }
    }

    fn bind(&mut self) -> Result<(), BindError> {
        let dispatcher = self.dispatcher.clone().ok_or(BindError::NotInitialized)?;
        let device = self.device.as_mut().ok_or(BindError::NotInitialized)?;

        let activation = if device.is_open() {
            Activation::All
        } else {
            match device.open() {
                Ok(()) => {
                    self.opened_device = true;
                    Activation::All
                }
                Err(HostError::ExclusiveAccess) => {
                    debug!("device is held exclusively elsewhere, using its current configuration");
                    Activation::CurrentOnly
                }
                Err(err) => return Err(BindError::Open(err)),
            }
        };
        self.state = DriverState::Configured;

        let dev_desc = device.device_descriptor().map_err(BindError::Descriptor)?;
        dump_device(device, &dev_desc);

        self.state = DriverState::Scanning;
        scan(device, &dev_desc, activation, &mut self.pipes)?;
        self.state = DriverState::PipesBound;

        let (in_pipe, out_pipe) = match (self.pipes.input(), self.pipes.output()) {
            (Some(in_pipe), Some(out_pipe)) => (in_pipe, out_pipe),
            (input, output) => {
                return Err(BindError::MissingEndpoints {
                    input: input.is_some(),
                    output: output.is_some(),
                })
            }
        };

        self.state = DriverState::Handshaking;
        let capacity = dispatcher.buffer(BufferSlot::Input).capacity();
        dispatcher.submit(in_pipe, BufferSlot::Input, capacity)?;
        send_probe(&dispatcher, out_pipe)?;
        Ok(())
    }

    fn release_device(&mut self) {
        if let Some(mut device) = self.device.take() {
            if self.opened_device && device.is_open() {
                device.close();
            }
            drop(device);
        }
        self.opened_device = false;
    }

    /// Releases the pipes and the device. Safe to call at any point, and more than once.
    pub fn stop(&mut self) {
        if self.state == DriverState::Stopped {
            debug!("stop: already stopped");
            return;
        }
        info!("stop");
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.tear_down();
        }
        self.pipes.release_all();
        self.release_device();
        self.state = DriverState::Stopped;
    }

    pub fn detach(&mut self, provider: &Provider<H>) {
        info!("detach: {}", provider.kind());
    }

    /// Frees the transfer buffers. Any transfer still outstanding keeps its buffer alive until
    /// it completes.
    pub fn free(&mut self) {
        match self.dispatcher.take() {
            Some(dispatcher) => {
                dispatcher.tear_down();
                debug!("freed transfer buffers");
            }
            None => debug!("free: buffers already freed"),
        }
    }
}

impl<H: UsbHost> Drop for OdinDriver<H> {
    fn drop(&mut self) {
        if self.state != DriverState::Stopped && self.device.is_some() {
            warn!("driver dropped while bound, stopping");
            self.stop();
        }
    }
}

fn resolve_string<H: UsbHost>(device: &H, index: u8) -> String {
    if index == 0 {
        return String::new();
    }
    match device.string_descriptor(index) {
        Ok(string) => string,
        Err(err) => {
            debug!("failed to read string descriptor {}: {}", index, err);
            String::new()
        }
    }
}

fn dump_device<H: UsbHost>(device: &H, dev_desc: &DevDesc) {
    let manufacturer = resolve_string(device, dev_desc.manufacturer_str);
    let product = resolve_string(device, dev_desc.product_str);
    let serial = resolve_string(device, dev_desc.serial_str);

    info!(
        "device: {:?} {:?} (serial {:?})",
        manufacturer, product, serial
    );
    info!(
        "  length {}, class {}.{}.{}, usb {}.{}, max packet size {}",
        dev_desc.length,
        dev_desc.class,
        dev_desc.sub_class,
        dev_desc.protocol,
        dev_desc.major_version(),
        dev_desc.minor_version(),
        dev_desc.packet_size
    );
    info!(
        "  id {:04x}:{:04x}, release {:04x}",
        dev_desc.vendor, dev_desc.product, dev_desc.release
    );
    info!(
        "  strings: manufacturer {}, product {}, serial {}; {} configurations",
        dev_desc.manufacturer_str,
        dev_desc.product_str,
        dev_desc.serial_str,
        dev_desc.configurations
    );
}
