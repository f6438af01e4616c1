use plain::Plain;

/// The descriptor for a USB Endpoint.
///
/// It cannot be requested on its own; it follows its interface descriptor inside the
/// configuration descriptor.
///
/// See USB32 9.6.6, Table 9-26.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct EndpointDescriptor {
    pub length: u8,
    pub kind: u8,
    /// Bit 7 is the direction (set for IN), bits 3:0 the endpoint number.
    pub address: u8,
    /// Bits 1:0 are the transfer type, see [EndpointTy].
    pub attributes: u8,
    pub max_packet_size: u16,
    pub interval: u8,
}

unsafe impl Plain for EndpointDescriptor {}

/// Mask that is ANDed to [EndpointDescriptor].attributes to get the transfer type.
pub const ENDP_ATTR_TY_MASK: u8 = 0x3;

/// Set in [EndpointDescriptor].address for device-to-host endpoints.
pub const ENDP_ADDR_DIR_IN: u8 = 0x80;

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum EndpointTy {
    Ctrl = 0,
    Isoch = 1,
    Bulk = 2,
    Interrupt = 3,
}

impl EndpointTy {
    pub fn from_attributes(attributes: u8) -> Self {
        match attributes & ENDP_ATTR_TY_MASK {
            0 => Self::Ctrl,
            1 => Self::Isoch,
            2 => Self::Bulk,
            _ => Self::Interrupt,
        }
    }
}
