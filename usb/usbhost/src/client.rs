use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::{io, result, str};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::desc::{decode_string_descriptor, ConfDesc, DescError, DevDesc};
use crate::usb::{self, DescriptorKind, SetupReq};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigureEndpointsReq {
    /// The bConfigurationValue of the configuration to activate.
    pub config_desc: u8,
    pub interface_desc: Option<u8>,
    pub alternate_setting: Option<u8>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PortReq {
    pub direction: PortReqDirection,
    pub req_type: PortReqTy,
    pub req_recipient: PortReqRecipient,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    pub length: u16,
    pub transfers_data: bool,
}
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum PortReqDirection {
    HostToDevice,
    DeviceToHost,
}
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum PortReqTy {
    Class,
    Vendor,
    Standard,
}
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum PortReqRecipient {
    Device,
    Interface,
    Endpoint,
    Other,
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PortState {
    EnabledOrDisabled,
    Default,
    Addressed,
    Configured,
}

#[derive(Debug, Error)]
#[error("invalid input: {0}")]
pub struct Invalid(pub &'static str);

impl str::FromStr for PortState {
    type Err = Invalid;

    fn from_str(s: &str) -> result::Result<Self, Self::Err> {
        Ok(match s.trim() {
            "enabled_or_disabled" | "enabled/disabled" => Self::EnabledOrDisabled,
            "default" => Self::Default,
            "addressed" => Self::Addressed,
            "configured" => Self::Configured,
            _ => return Err(Invalid("read reserved port state")),
        })
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum EndpointStatus {
    Disabled,
    Enabled,
    Halted,
    Stopped,
    Error,
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct TransferStatus {
    pub kind: TransferStatusKind,
    pub bytes_transferred: u32,
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum TransferStatusKind {
    #[default]
    Success,
    ShortPacket,
    Stalled,
    Unknown,
}

pub enum DeviceReqData<'a> {
    In(&'a mut [u8]),
    Out(&'a [u8]),
    NoData,
}
impl DeviceReqData<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::In(buf) => buf.len(),
            Self::Out(buf) => buf.len(),
            Self::NoData => 0,
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn direction(&self) -> PortReqDirection {
        match self {
            DeviceReqData::In(_) => PortReqDirection::DeviceToHost,
            DeviceReqData::Out(_) | DeviceReqData::NoData => PortReqDirection::HostToDevice,
        }
    }
}

/// A handle to one port of the host controller daemon's scheme.
#[derive(Clone, Debug)]
pub struct UsbClientHandle {
    scheme: String,
    port: usize,
}

impl UsbClientHandle {
    pub fn new(scheme: String, port: usize) -> Self {
        Self { scheme, port }
    }
    pub fn scheme(&self) -> &str {
        &self.scheme
    }
    pub fn port(&self) -> usize {
        self.port
    }

    fn path(&self, leaf: &str) -> String {
        format!("/scheme/{}/port{}/{}", self.scheme, self.port, leaf)
    }

    pub fn port_state(&self) -> result::Result<PortState, UsbClientHandleError> {
        let string = std::fs::read_to_string(self.path("state"))?;
        Ok(string.parse()?)
    }

    pub fn configure_endpoints(
        &self,
        req: &ConfigureEndpointsReq,
    ) -> result::Result<(), UsbClientHandleError> {
        let json = serde_json::to_vec(req)?;
        let mut file = OpenOptions::new()
            .read(false)
            .write(true)
            .open(self.path("configure"))?;
        if file.write(&json)? != json.len() {
            return Err(Invalid("configure_endpoints didn't write every request byte").into());
        }
        Ok(())
    }

    /// Performs a control transfer on endpoint zero, returning the number of bytes moved in
    /// the data stage. Device-to-host transfers may legitimately return fewer bytes than the
    /// buffer holds.
    pub fn device_request(
        &self,
        req_type: PortReqTy,
        req_recipient: PortReqRecipient,
        request: u8,
        value: u16,
        index: u16,
        data: DeviceReqData<'_>,
    ) -> result::Result<usize, UsbClientHandleError> {
        let length = u16::try_from(data.len())
            .or(Err(UsbClientHandleError::TransferBufTooLarge(data.len())))?;

        let req = PortReq {
            direction: data.direction(),
            req_type,
            req_recipient,
            request,
            value,
            index,
            length,
            transfers_data: !matches!(data, DeviceReqData::NoData),
        };
        let json = serde_json::to_vec(&req)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.path("request"))?;
        if file.write(&json)? != json.len() {
            return Err(Invalid("device_request didn't write every request byte").into());
        }

        match data {
            DeviceReqData::In(buf) => Ok(file.read(buf)?),
            DeviceReqData::Out(buf) => {
                let bytes_written = file.write(buf)?;
                if bytes_written != buf.len() {
                    return Err(Invalid("device_request didn't transfer all host2dev bytes").into());
                }
                Ok(bytes_written)
            }
            DeviceReqData::NoData => Ok(0),
        }
    }

    pub fn get_descriptor(
        &self,
        kind: DescriptorKind,
        index: u8,
        language: u16,
        buffer: &mut [u8],
    ) -> result::Result<usize, UsbClientHandleError> {
        self.device_request(
            PortReqTy::Standard,
            PortReqRecipient::Device,
            SetupReq::GetDescriptor as u8,
            (u16::from(kind as u8) << 8) | u16::from(index),
            language,
            DeviceReqData::In(buffer),
        )
    }

    pub fn device_descriptor(&self) -> result::Result<DevDesc, UsbClientHandleError> {
        let mut buffer = [0u8; 18];
        let len = self.get_descriptor(DescriptorKind::Device, 0, 0, &mut buffer)?;
        Ok(DevDesc::parse(&buffer[..len])?)
    }

    /// Reads the configuration descriptor at `index` (not its bConfigurationValue) along with
    /// everything that follows it.
    pub fn config_descriptor(&self, index: u8) -> result::Result<ConfDesc, UsbClientHandleError> {
        let mut header = [0u8; 9];
        let len = self.get_descriptor(DescriptorKind::Configuration, index, 0, &mut header)?;
        let header = plain::from_bytes::<usb::ConfigDescriptor>(&header[..len])
            .map_err(|_| DescError::TooShort(len))?;

        let mut buffer = vec![0u8; usize::from(u16::from_le(header.total_length))];
        let len = self.get_descriptor(DescriptorKind::Configuration, index, 0, &mut buffer)?;
        Ok(ConfDesc::parse(&buffer[..len])?)
    }

    pub fn string_descriptor(
        &self,
        index: u8,
        language: u16,
    ) -> result::Result<String, UsbClientHandleError> {
        let mut buffer = [0u8; 255];
        let len = self.get_descriptor(DescriptorKind::String, index, language, &mut buffer)?;
        Ok(decode_string_descriptor(&buffer[..len])?)
    }

    /// Opens non-control endpoint `num` (the low four bits of its address).
    pub fn open_endpoint(&self, num: u8) -> result::Result<EndpHandle, UsbClientHandleError> {
        let ctl = OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.path(&format!("endpoints/{}/ctl", num)))?;
        let data = OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.path(&format!("endpoints/{}/data", num)))?;
        Ok(EndpHandle { ctl, data })
    }
}

#[derive(Debug)]
pub struct EndpHandle {
    data: File,
    ctl: File,
}

/// The direction of a transfer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum EndpCtlDirection {
    /// Host to device
    Out,
    /// Device to host
    In,
}

/// A request written to an endpoint's `ctl` file, serialized with JSON.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EndpCtlReq {
    /// Announces a transfer of `count` bytes through the `data` file. The transfer is complete
    /// once that many bytes were read or written, or the device ended it early.
    Transfer {
        direction: EndpCtlDirection,
        count: u32,
    },

    /// Asks for the endpoint status to be read back from the `ctl` file.
    Status,
}

/// A response read from an endpoint's `ctl` file, serialized with JSON.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum EndpCtlRes {
    Status(EndpointStatus),
    TransferResult(TransferStatus),
    /// Waiting for the `data` file to be read or written.
    Pending,
    /// No request is being processed.
    Idle,
}

impl EndpHandle {
    fn ctl_req(&mut self, ctl_req: &EndpCtlReq) -> result::Result<(), UsbClientHandleError> {
        let ctl_buffer = serde_json::to_vec(ctl_req)?;

        if self.ctl.write(&ctl_buffer)? != ctl_buffer.len() {
            return Err(Invalid("the controller didn't process all of the ctl bytes").into());
        }
        Ok(())
    }
    fn ctl_res(&mut self) -> result::Result<EndpCtlRes, UsbClientHandleError> {
        // a response never exceeds 256 bytes
        let mut ctl_buffer = [0u8; 256];
        let ctl_bytes_read = self.ctl.read(&mut ctl_buffer)?;

        Ok(serde_json::from_slice(&ctl_buffer[..ctl_bytes_read])?)
    }
    pub fn status(&mut self) -> result::Result<EndpointStatus, UsbClientHandleError> {
        self.ctl_req(&EndpCtlReq::Status)?;
        match self.ctl_res()? {
            EndpCtlRes::Status(s) => Ok(s),
            _ => Err(Invalid("expected status response").into()),
        }
    }
    fn generic_transfer<F: FnOnce(&mut File) -> io::Result<usize>>(
        &mut self,
        direction: EndpCtlDirection,
        f: F,
        expected_len: usize,
    ) -> result::Result<TransferStatus, UsbClientHandleError> {
        let count = u32::try_from(expected_len)
            .or(Err(UsbClientHandleError::TransferBufTooLarge(expected_len)))?;
        self.ctl_req(&EndpCtlReq::Transfer { direction, count })?;

        let bytes_moved = f(&mut self.data)?;

        match self.ctl_res()? {
            EndpCtlRes::TransferResult(TransferStatus {
                kind: TransferStatusKind::Success,
                ..
            }) if bytes_moved != expected_len => {
                Err(Invalid("no short packet, but fewer bytes were read/written").into())
            }
            EndpCtlRes::TransferResult(r) => Ok(r),
            _ => Err(Invalid("expected transfer result").into()),
        }
    }
    pub fn transfer_write(
        &mut self,
        buf: &[u8],
    ) -> result::Result<TransferStatus, UsbClientHandleError> {
        self.generic_transfer(EndpCtlDirection::Out, |data| data.write(buf), buf.len())
    }
    pub fn transfer_read(
        &mut self,
        buf: &mut [u8],
    ) -> result::Result<TransferStatus, UsbClientHandleError> {
        let len = buf.len();
        self.generic_transfer(EndpCtlDirection::In, |data| data.read(buf), len)
    }
}

#[derive(Debug, Error)]
pub enum UsbClientHandleError {
    #[error("i/o error: {0}")]
    IoError(#[from] io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(#[from] Invalid),

    #[error("malformed descriptor: {0}")]
    Descriptor(#[from] DescError),

    #[error("transfer buffer too large ({0} bytes)")]
    TransferBufTooLarge(usize),
}
