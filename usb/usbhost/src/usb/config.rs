/// The header of a Configuration Descriptor. (USB32 9.6.3, Table 9-22)
///
/// A GET_DESCRIPTOR request for a configuration returns this header followed by every
/// interface, endpoint and class-specific descriptor of the configuration, `total_length`
/// bytes in all.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfigDescriptor {
    pub length: u8,
    pub kind: u8,
    pub total_length: u16,
    pub interfaces: u8,
    pub configuration_value: u8,
    pub configuration_str: u8,
    pub attributes: u8,
    pub max_power: u8,
}

unsafe impl plain::Plain for ConfigDescriptor {}
