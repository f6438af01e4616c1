use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use lazy_static::lazy_static;
use log::{debug, trace, warn};
use usbhost_interface::usb::LANG_EN_US;
use usbhost_interface::{
    ConfDesc, ConfigureEndpointsReq, DevDesc, EndpBinaryDirection, EndpDesc, EndpHandle,
    IfDesc, TransferStatus as EndpTransferStatus, TransferStatusKind, UsbClientHandle,
    UsbClientHandleError,
};

use crate::buffer::DmaBuffer;
use crate::dispatch::CompletionContext;
use crate::error::HostError;
use crate::host::{Child, Pipe, TransferStatus, UsbHost};

lazy_static! {
    /// Ports opened by a `SchemeHost` in this process.
    static ref CLAIMS: Mutex<BTreeSet<String>> = Mutex::new(BTreeSet::new());
}

/// A device behind a port of the host controller daemon's scheme.
pub struct SchemeHost {
    handle: Arc<UsbClientHandle>,
    open: bool,
    active_config: Option<u8>,
}

impl SchemeHost {
    pub fn new(handle: UsbClientHandle) -> Self {
        Self {
            handle: Arc::new(handle),
            open: false,
            active_config: None,
        }
    }
    pub fn handle(&self) -> &UsbClientHandle {
        &self.handle
    }

    fn claim_key(&self) -> String {
        format!("{}/port{}", self.handle.scheme(), self.handle.port())
    }

    /// The active configuration, or the first one if none was activated through this host.
    fn current_config(&self) -> Result<ConfDesc, HostError> {
        let configurations = self.device_descriptor()?.configurations;
        let mut first = None;
        for index in 0..configurations {
            let conf_desc = self.configuration_descriptor(index)?;
            match self.active_config {
                Some(value) if conf_desc.configuration_value == value => return Ok(conf_desc),
                Some(_) => {
                    first.get_or_insert(conf_desc);
                }
                None => return Ok(conf_desc),
            }
        }
        first.ok_or(HostError::Refused("device has no configurations"))
    }
}

impl UsbHost for SchemeHost {
    type Pipe = SchemePipe;

    fn is_open(&self) -> bool {
        self.open
    }

    fn open(&mut self) -> Result<(), HostError> {
        if self.open {
            return Ok(());
        }
        let mut claims = CLAIMS.lock().unwrap_or_else(PoisonError::into_inner);
        if !claims.insert(self.claim_key()) {
            return Err(HostError::ExclusiveAccess);
        }
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        let mut claims = CLAIMS.lock().unwrap_or_else(PoisonError::into_inner);
        claims.remove(&self.claim_key());
        self.open = false;
    }

    fn device_descriptor(&self) -> Result<DevDesc, HostError> {
        Ok(self.handle.device_descriptor()?)
    }

    fn configuration_descriptor(&self, index: u8) -> Result<ConfDesc, HostError> {
        Ok(self.handle.config_descriptor(index)?)
    }

    fn set_configuration(&mut self, value: u8) -> Result<(), HostError> {
        if !self.open {
            return Err(HostError::NotOpen);
        }
        self.handle.configure_endpoints(&ConfigureEndpointsReq {
            config_desc: value,
            interface_desc: None,
            alternate_setting: None,
        })?;
        self.active_config = Some(value);
        Ok(())
    }

    fn children(&self) -> Result<Vec<Child>, HostError> {
        let conf_desc = self.current_config()?;
        Ok(conf_desc
            .interface_descs
            .into_iter()
            .map(Child::Interface)
            .collect())
    }

    fn string_descriptor(&self, index: u8) -> Result<String, HostError> {
        Ok(self.handle.string_descriptor(index, LANG_EN_US)?)
    }

    fn copy_pipe(
        &mut self,
        interface: &IfDesc,
        endpoint: &EndpDesc,
    ) -> Result<SchemePipe, HostError> {
        if !interface.endpoints.contains(endpoint) {
            return Err(HostError::InvalidEndpoint(endpoint.address));
        }
        let endp = self.handle.open_endpoint(endpoint.number())?;
        Ok(SchemePipe {
            address: endpoint.address,
            endp: Arc::new(Mutex::new(endp)),
            aborted: Arc::new(AtomicBool::new(false)),
        })
    }
}

impl Drop for SchemeHost {
    fn drop(&mut self) {
        self.close();
    }
}

/// An endpoint of a `SchemeHost`. Each transfer runs on its own thread, since the endpoint
/// files block until the transfer is done.
pub struct SchemePipe {
    address: u8,
    endp: Arc<Mutex<EndpHandle>>,
    aborted: Arc<AtomicBool>,
}

fn transfer_status(kind: TransferStatusKind) -> TransferStatus {
    match kind {
        TransferStatusKind::Success => TransferStatus::Success,
        TransferStatusKind::ShortPacket => TransferStatus::ShortPacket,
        TransferStatusKind::Stalled => TransferStatus::Stalled,
        TransferStatusKind::Unknown => TransferStatus::Error,
    }
}

/// The completion status of a finished blocking transfer of `length` bytes, and how many of
/// them were moved. Nothing counts as moved once the pipe was aborted.
fn transfer_outcome(
    result: &Result<EndpTransferStatus, UsbClientHandleError>,
    aborted: bool,
    length: usize,
) -> (TransferStatus, usize) {
    if aborted {
        return (TransferStatus::Aborted, 0);
    }
    match result {
        Ok(status) => (
            transfer_status(status.kind),
            (status.bytes_transferred as usize).min(length),
        ),
        Err(_) => (TransferStatus::Error, 0),
    }
}

impl Pipe for SchemePipe {
    fn address(&self) -> u8 {
        self.address
    }

    fn io(
        &self,
        buffer: &DmaBuffer,
        length: usize,
        context: CompletionContext,
    ) -> Result<(), HostError> {
        if self.aborted.load(Ordering::Acquire) {
            return Err(HostError::Aborted);
        }
        if length > buffer.capacity() {
            return Err(HostError::Refused("transfer exceeds buffer"));
        }

        let address = self.address;
        let buffer = buffer.clone();
        let endp = Arc::clone(&self.endp);
        let aborted = Arc::clone(&self.aborted);

        thread::Builder::new()
            .name(format!("odinxd-endp-{:02x}", address))
            .spawn(move || {
                let direction = buffer.direction();
                let mut data = match direction {
                    EndpBinaryDirection::In => vec![0u8; length],
                    EndpBinaryDirection::Out => buffer.to_vec(length),
                };

                let result = {
                    let mut endp = endp.lock().unwrap_or_else(PoisonError::into_inner);
                    let result = match direction {
                        EndpBinaryDirection::In => endp.transfer_read(&mut data),
                        EndpBinaryDirection::Out => endp.transfer_write(&data),
                    };
                    if let Ok(EndpTransferStatus {
                        kind: TransferStatusKind::Stalled,
                        ..
                    }) = result
                    {
                        match endp.status() {
                            Ok(status) => {
                                warn!("endpoint {:#04x} stalled, now {:?}", address, status)
                            }
                            Err(err) => warn!("endpoint {:#04x} stalled: {}", address, err),
                        }
                    }
                    result
                };
                if let Err(err) = &result {
                    warn!("transfer on endpoint {:#04x} failed: {}", address, err);
                }

                // the transfer itself cannot be interrupted, so an abort only drops its result
                let aborted = aborted.load(Ordering::Acquire);
                if aborted {
                    debug!("endpoint {:#04x} was aborted, discarding transfer", address);
                }
                let (status, moved) = transfer_outcome(&result, aborted, length);
                trace!("endpoint {:#04x}: {:?}, {} bytes", address, status, moved);
                if direction == EndpBinaryDirection::In && moved > 0 {
                    buffer.write(|mem| mem[..moved].copy_from_slice(&data[..moved]));
                }
                context.complete(status, length - moved);
            })?;
        Ok(())
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }
}
