use log::{debug, trace};
use usbhost_interface::{EndpBinaryDirection, EndpDesc, IfDesc};

use crate::error::BindError;
use crate::host::{Pipe, UsbHost};

/// The two pipes of a bound device, at most one per direction.
#[derive(Debug)]
pub struct Pipes<P: Pipe> {
    input: Option<P>,
    output: Option<P>,
}

impl<P: Pipe> Default for Pipes<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Pipe> Pipes<P> {
    pub fn new() -> Self {
        Self {
            input: None,
            output: None,
        }
    }

    fn slot_mut(&mut self, direction: EndpBinaryDirection) -> &mut Option<P> {
        match direction {
            EndpBinaryDirection::In => &mut self.input,
            EndpBinaryDirection::Out => &mut self.output,
        }
    }

    pub fn input(&self) -> Option<&P> {
        self.input.as_ref()
    }
    pub fn output(&self) -> Option<&P> {
        self.output.as_ref()
    }
    pub fn is_bound(&self, direction: EndpBinaryDirection) -> bool {
        match direction {
            EndpBinaryDirection::In => self.input.is_some(),
            EndpBinaryDirection::Out => self.output.is_some(),
        }
    }
    pub fn is_complete(&self) -> bool {
        self.input.is_some() && self.output.is_some()
    }

    /// Opens a pipe for `endpoint` and stores it as the `direction` pipe.
    pub fn bind<H>(
        &mut self,
        host: &mut H,
        interface: &IfDesc,
        direction: EndpBinaryDirection,
        endpoint: &EndpDesc,
    ) -> Result<&P, BindError>
    where
        H: UsbHost<Pipe = P>,
    {
        if EndpBinaryDirection::of_address(endpoint.address) != direction {
            return Err(BindError::WrongDirection {
                address: endpoint.address,
            });
        }
        if self.is_bound(direction) {
            return Err(BindError::AlreadyBound { direction });
        }

        let pipe = host
            .copy_pipe(interface, endpoint)
            .map_err(|source| BindError::Pipe {
                address: endpoint.address,
                source,
            })?;
        debug!(
            "bound {:?} pipe to endpoint {:#04x} of interface {}",
            direction, endpoint.address, interface.number
        );
        let pipe: &P = self.slot_mut(direction).insert(pipe);
        Ok(pipe)
    }

    /// Aborts and drops the `direction` pipe. Returns whether there was one.
    pub fn release(&mut self, direction: EndpBinaryDirection) -> bool {
        match self.slot_mut(direction).take() {
            Some(pipe) => {
                trace!("releasing {:?} pipe {:#04x}", direction, pipe.address());
                pipe.abort();
                drop(pipe);
                true
            }
            None => false,
        }
    }

    pub fn release_all(&mut self) {
        self.release(EndpBinaryDirection::In);
        self.release(EndpBinaryDirection::Out);
    }
}

impl<P: Pipe> Drop for Pipes<P> {
    fn drop(&mut self) {
        self.release_all();
    }
}
