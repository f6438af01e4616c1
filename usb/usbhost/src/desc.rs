use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::usb::{self, DescriptorKind, EndpointTy, ENDP_ADDR_DIR_IN};

#[derive(Debug, Error)]
pub enum DescError {
    #[error("descriptor too short ({0} bytes)")]
    TooShort(usize),

    #[error("unexpected descriptor type {found} (expected {expected})")]
    UnexpectedKind { expected: u8, found: u8 },

    #[error("zero-length descriptor at offset {0}")]
    ZeroLength(usize),

    #[error("descriptor at offset {offset} overruns the configuration ({len} > {remaining})")]
    Overrun {
        offset: usize,
        len: usize,
        remaining: usize,
    },

    #[error("endpoint descriptor at offset {0} precedes any interface")]
    OrphanEndpoint(usize),
}

fn read<T: plain::Plain + Copy>(bytes: &[u8]) -> Result<T, DescError> {
    plain::from_bytes::<T>(bytes)
        .map(|desc| *desc)
        .map_err(|_| DescError::TooShort(bytes.len()))
}

fn expect_kind(kind: DescriptorKind, found: u8) -> Result<(), DescError> {
    if found != kind as u8 {
        return Err(DescError::UnexpectedKind {
            expected: kind as u8,
            found,
        });
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DevDesc {
    pub length: u8,
    pub usb: u16,
    pub class: u8,
    pub sub_class: u8,
    pub protocol: u8,
    pub packet_size: u8,
    pub vendor: u16,
    pub product: u16,
    pub release: u16,
    pub manufacturer_str: u8,
    pub product_str: u8,
    pub serial_str: u8,
    pub configurations: u8,
}

impl DevDesc {
    pub fn parse(bytes: &[u8]) -> Result<Self, DescError> {
        let raw = read::<usb::DeviceDescriptor>(bytes)?;
        expect_kind(DescriptorKind::Device, raw.kind)?;
        Ok(raw.into())
    }
    pub fn major_version(&self) -> u8 {
        ((self.usb & 0xFF00) >> 8) as u8
    }
    pub fn minor_version(&self) -> u8 {
        self.usb as u8
    }
}

impl From<usb::DeviceDescriptor> for DevDesc {
    fn from(d: usb::DeviceDescriptor) -> Self {
        Self {
            length: d.length,
            usb: u16::from_le(d.usb),
            class: d.class,
            sub_class: d.sub_class,
            protocol: d.protocol,
            packet_size: d.packet_size,
            vendor: u16::from_le(d.vendor),
            product: u16::from_le(d.product),
            release: u16::from_le(d.release),
            manufacturer_str: d.manufacturer_str,
            product_str: d.product_str,
            serial_str: d.serial_str,
            configurations: d.configurations,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfDesc {
    pub configuration_value: u8,
    pub configuration_str: u8,
    pub attributes: u8,
    pub max_power: u8,
    pub interface_descs: SmallVec<[IfDesc; 2]>,
}

impl ConfDesc {
    /// Parses a full configuration descriptor, as returned by GET_DESCRIPTOR with the length
    /// set to the header's `total_length`.
    ///
    /// Endpoints are attached to the interface descriptor preceding them, in the order the
    /// device lists them. Class-specific descriptors are skipped.
    pub fn parse(bytes: &[u8]) -> Result<Self, DescError> {
        let header = read::<usb::ConfigDescriptor>(bytes)?;
        expect_kind(DescriptorKind::Configuration, header.kind)?;

        let total = usize::from(u16::from_le(header.total_length)).min(bytes.len());
        let mut conf = Self {
            configuration_value: header.configuration_value,
            configuration_str: header.configuration_str,
            attributes: header.attributes,
            max_power: header.max_power,
            interface_descs: SmallVec::new(),
        };

        let mut offset = usize::from(header.length);
        while offset < total {
            let (desc, len) = AnyDescriptor::parse(&bytes[offset..total], offset)?;
            match desc {
                AnyDescriptor::Interface(if_desc) => conf.interface_descs.push(if_desc.into()),
                AnyDescriptor::Endpoint(endp_desc) => conf
                    .interface_descs
                    .last_mut()
                    .ok_or(DescError::OrphanEndpoint(offset))?
                    .endpoints
                    .push(endp_desc.into()),
                AnyDescriptor::Other(kind) => {
                    log::trace!("skipping descriptor type {:#04x} at offset {}", kind, offset)
                }
            }
            offset += len;
        }
        Ok(conf)
    }
}

/// Any descriptor that can be stored in the data area following a configuration descriptor.
#[derive(Debug)]
enum AnyDescriptor {
    Interface(usb::InterfaceDescriptor),
    Endpoint(usb::EndpointDescriptor),
    Other(u8),
}

impl AnyDescriptor {
    fn parse(bytes: &[u8], offset: usize) -> Result<(Self, usize), DescError> {
        if bytes.len() < 2 {
            return Err(DescError::TooShort(bytes.len()));
        }

        let len = usize::from(bytes[0]);
        let kind = bytes[1];

        if len == 0 {
            return Err(DescError::ZeroLength(offset));
        }
        if len > bytes.len() {
            return Err(DescError::Overrun {
                offset,
                len,
                remaining: bytes.len(),
            });
        }

        let desc = match kind {
            k if k == DescriptorKind::Interface as u8 => Self::Interface(read(&bytes[..len])?),
            k if k == DescriptorKind::Endpoint as u8 => Self::Endpoint(read(&bytes[..len])?),
            other => Self::Other(other),
        };
        Ok((desc, len))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IfDesc {
    pub number: u8,
    pub alternate_setting: u8,
    pub class: u8,
    pub sub_class: u8,
    pub protocol: u8,
    pub interface_str: u8,
    pub endpoints: SmallVec<[EndpDesc; 4]>,
}

impl From<usb::InterfaceDescriptor> for IfDesc {
    fn from(d: usb::InterfaceDescriptor) -> Self {
        Self {
            number: d.number,
            alternate_setting: d.alternate_setting,
            class: d.class,
            sub_class: d.sub_class,
            protocol: d.protocol,
            interface_str: d.interface_str,
            endpoints: SmallVec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct EndpDesc {
    pub address: u8,
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

impl From<usb::EndpointDescriptor> for EndpDesc {
    fn from(d: usb::EndpointDescriptor) -> Self {
        Self {
            address: d.address,
            attributes: d.attributes,
            max_packet_size: u16::from_le(d.max_packet_size),
            interval: d.interval,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EndpDirection {
    Out,
    In,
    Bidirectional,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum EndpBinaryDirection {
    Out,
    In,
}

impl EndpBinaryDirection {
    /// The direction encoded in bit 7 of an endpoint address.
    pub fn of_address(address: u8) -> Self {
        if address & ENDP_ADDR_DIR_IN != 0 {
            Self::In
        } else {
            Self::Out
        }
    }
}

impl From<EndpBinaryDirection> for EndpDirection {
    fn from(b: EndpBinaryDirection) -> Self {
        match b {
            EndpBinaryDirection::In => Self::In,
            EndpBinaryDirection::Out => Self::Out,
        }
    }
}

impl EndpDesc {
    pub fn ty(&self) -> EndpointTy {
        EndpointTy::from_attributes(self.attributes)
    }
    pub fn is_bulk(&self) -> bool {
        self.ty() == EndpointTy::Bulk
    }
    pub fn is_control(&self) -> bool {
        self.ty() == EndpointTy::Ctrl
    }
    pub fn number(&self) -> u8 {
        self.address & 0x0F
    }
    pub fn direction(&self) -> EndpDirection {
        if self.is_control() {
            return EndpDirection::Bidirectional;
        }
        EndpBinaryDirection::of_address(self.address).into()
    }
    /// The direction of a non-control endpoint.
    pub fn binary_direction(&self) -> Option<EndpBinaryDirection> {
        match self.direction() {
            EndpDirection::In => Some(EndpBinaryDirection::In),
            EndpDirection::Out => Some(EndpBinaryDirection::Out),
            EndpDirection::Bidirectional => None,
        }
    }
}

/// Decodes a String Descriptor (USB32 9.6.9): a two byte header followed by UTF-16LE code
/// units. Unpaired surrogates are replaced rather than rejected.
pub fn decode_string_descriptor(bytes: &[u8]) -> Result<String, DescError> {
    if bytes.len() < 2 {
        return Err(DescError::TooShort(bytes.len()));
    }
    expect_kind(DescriptorKind::String, bytes[1])?;

    let len = usize::from(bytes[0]).clamp(2, bytes.len());
    let units: Vec<u16> = bytes[2..len]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok(String::from_utf16_lossy(&units))
}
