/// A USB Device Descriptor. (USB32 9.6.1, Table 9-11)
///
/// A device has exactly one. It carries the vendor and product IDs used to match drivers, and
/// the number of configurations the device can be put into.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default)]
pub struct DeviceDescriptor {
    /// bLength
    pub length: u8,
    /// bDescriptorType, always 1.
    pub kind: u8,
    /// bcdUSB, the USB release in binary-coded decimal (2.1 is 0x210).
    pub usb: u16,
    /// bDeviceClass. Zero means each interface reports its own class.
    pub class: u8,
    /// bDeviceSubClass
    pub sub_class: u8,
    /// bDeviceProtocol
    pub protocol: u8,
    /// bMaxPacketSize0, the maximum packet size of endpoint zero.
    pub packet_size: u8,
    /// idVendor
    pub vendor: u16,
    /// idProduct
    pub product: u16,
    /// bcdDevice, the device release in binary-coded decimal.
    pub release: u16,
    /// iManufacturer, zero if there is no such string.
    pub manufacturer_str: u8,
    /// iProduct
    pub product_str: u8,
    /// iSerialNumber
    pub serial_str: u8,
    /// bNumConfigurations
    pub configurations: u8,
}

unsafe impl plain::Plain for DeviceDescriptor {}
