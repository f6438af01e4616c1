//! The standard USB descriptors, in the layout the device sends them.
//!
//! Every structure here is `#[repr(C, packed)]` and implements [plain::Plain], so it can be
//! read directly out of a descriptor buffer. Multi-byte fields are little-endian on the wire;
//! the [crate::desc] types convert them.
pub use self::config::ConfigDescriptor;
pub use self::device::DeviceDescriptor;
pub use self::endpoint::{EndpointDescriptor, EndpointTy, ENDP_ADDR_DIR_IN, ENDP_ATTR_TY_MASK};
pub use self::interface::InterfaceDescriptor;
pub use self::setup::SetupReq;

/// The descriptor kinds this crate decodes. (See USB32 Table 9-6)
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum DescriptorKind {
    /// See [DeviceDescriptor]
    Device = 1,
    /// See [ConfigDescriptor]
    Configuration = 2,
    /// A String Descriptor. See USB32 Section 9.6.9.
    String = 3,
    /// See [InterfaceDescriptor]
    Interface = 4,
    /// See [EndpointDescriptor]
    Endpoint = 5,
}

/// The language ID requested for string descriptors (English, United States).
pub const LANG_EN_US: u16 = 0x0409;

pub(crate) mod config;
pub(crate) mod device;
pub(crate) mod endpoint;
pub(crate) mod interface;
pub(crate) mod setup;
