#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use odinx::{
    Child, CompletionContext, DmaBuffer, HeapAllocator, HostError, OdinDriver, Pipe, Provider,
    TransferStatus, UsbHost,
};
use usbhost_interface::{ConfDesc, DevDesc, EndpDesc, IfDesc};

pub const BULK: u8 = 0x02;
pub const INTERRUPT: u8 = 0x03;

pub const CDC_COMM: u8 = 0x02;
pub const CDC_DATA: u8 = 0x0A;

pub struct Submission {
    pub address: u8,
    pub length: usize,
    /// The buffer contents at submission time.
    pub data: Vec<u8>,
}

pub struct Pending {
    pub address: u8,
    pub length: usize,
    pub buffer: DmaBuffer,
    pub context: CompletionContext,
}

impl Pending {
    /// Delivers `data` as the received bytes of an IN transfer.
    pub fn receive(self, data: &[u8], status: TransferStatus) {
        self.buffer
            .write(|mem| mem[..data.len()].copy_from_slice(data));
        self.context.complete(status, self.length - data.len());
    }
    pub fn finish(self, status: TransferStatus) {
        self.context.complete(status, 0);
    }
}

#[derive(Default)]
pub struct Journal {
    pub opened_pipes: Vec<u8>,
    pub released_pipes: Vec<u8>,
    pub aborts: Vec<u8>,
    pub submissions: Vec<Submission>,
    pub pending: Vec<Pending>,
    pub configurations_set: Vec<u8>,
    pub opens: usize,
    pub closes: usize,
    pub device_drops: usize,
}

#[derive(Clone, Default)]
pub struct SharedJournal(Arc<Mutex<Journal>>);

impl SharedJournal {
    pub fn lock(&self) -> MutexGuard<'_, Journal> {
        self.0.lock().unwrap()
    }
    /// Removes the oldest transfer pending on `address`.
    pub fn take_pending(&self, address: u8) -> Pending {
        let mut journal = self.lock();
        let index = journal
            .pending
            .iter()
            .position(|p| p.address == address)
            .unwrap_or_else(|| panic!("no transfer pending on {:#04x}", address));
        journal.pending.remove(index)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OpenBehavior {
    Ok,
    Exclusive,
    Fail,
}

pub struct FakeDevice {
    journal: SharedJournal,
    pub dev_desc: DevDesc,
    pub configs: Vec<ConfDesc>,
    pub other_children: Vec<String>,
    pub open_behavior: OpenBehavior,
    open: bool,
    active: Option<u8>,
}

impl FakeDevice {
    pub fn new(journal: &SharedJournal, configs: Vec<ConfDesc>) -> Self {
        Self {
            journal: journal.clone(),
            dev_desc: device_desc(configs.len() as u8),
            configs,
            other_children: Vec::new(),
            open_behavior: OpenBehavior::Ok,
            open: false,
            active: None,
        }
    }
}

impl UsbHost for FakeDevice {
    type Pipe = FakePipe;

    fn is_open(&self) -> bool {
        self.open
    }
    fn open(&mut self) -> Result<(), HostError> {
        match self.open_behavior {
            OpenBehavior::Ok => {
                self.open = true;
                self.journal.lock().opens += 1;
                Ok(())
            }
            OpenBehavior::Exclusive => Err(HostError::ExclusiveAccess),
            OpenBehavior::Fail => Err(HostError::Refused("unplugged")),
        }
    }
    fn close(&mut self) {
        self.open = false;
        self.journal.lock().closes += 1;
    }
    fn device_descriptor(&self) -> Result<DevDesc, HostError> {
        Ok(self.dev_desc.clone())
    }
    fn configuration_descriptor(&self, index: u8) -> Result<ConfDesc, HostError> {
        self.configs
            .get(usize::from(index))
            .cloned()
            .ok_or(HostError::Refused("no such configuration"))
    }
    fn set_configuration(&mut self, value: u8) -> Result<(), HostError> {
        self.active = Some(value);
        self.journal.lock().configurations_set.push(value);
        Ok(())
    }
    fn children(&self) -> Result<Vec<Child>, HostError> {
        let conf_desc = match self.active {
            Some(value) => self
                .configs
                .iter()
                .find(|c| c.configuration_value == value),
            None => self.configs.first(),
        };
        let mut children: Vec<Child> = self
            .other_children
            .iter()
            .cloned()
            .map(Child::Other)
            .collect();
        if let Some(conf_desc) = conf_desc {
            children.extend(conf_desc.interface_descs.iter().cloned().map(Child::Interface));
        }
        Ok(children)
    }
    fn string_descriptor(&self, index: u8) -> Result<String, HostError> {
        match index {
            1 => Ok("SAMSUNG".to_string()),
            2 => Ok("Gadget Serial".to_string()),
            _ => Err(HostError::Refused("no such string")),
        }
    }
    fn copy_pipe(
        &mut self,
        interface: &IfDesc,
        endpoint: &EndpDesc,
    ) -> Result<FakePipe, HostError> {
        if !interface.endpoints.contains(endpoint) {
            return Err(HostError::InvalidEndpoint(endpoint.address));
        }
        self.journal.lock().opened_pipes.push(endpoint.address);
        Ok(FakePipe {
            address: endpoint.address,
            journal: self.journal.clone(),
        })
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.journal.lock().device_drops += 1;
    }
}

pub struct FakePipe {
    address: u8,
    journal: SharedJournal,
}

impl Pipe for FakePipe {
    fn address(&self) -> u8 {
        self.address
    }
    fn io(
        &self,
        buffer: &DmaBuffer,
        length: usize,
        context: CompletionContext,
    ) -> Result<(), HostError> {
        let mut journal = self.journal.lock();
        journal.submissions.push(Submission {
            address: self.address,
            length,
            data: buffer.to_vec(length),
        });
        journal.pending.push(Pending {
            address: self.address,
            length,
            buffer: buffer.clone(),
            context,
        });
        Ok(())
    }
    fn abort(&self) {
        self.journal.lock().aborts.push(self.address);
    }
}

impl Drop for FakePipe {
    fn drop(&mut self) {
        self.journal.lock().released_pipes.push(self.address);
    }
}

pub fn device_desc(configurations: u8) -> DevDesc {
    DevDesc {
        length: 18,
        usb: 0x0200,
        class: 0x02,
        sub_class: 0,
        protocol: 0,
        packet_size: 64,
        vendor: 0x04e8,
        product: 0x685d,
        release: 0x0100,
        manufacturer_str: 1,
        product_str: 2,
        serial_str: 0,
        configurations,
    }
}

pub fn endpoint(address: u8, ty: u8) -> EndpDesc {
    EndpDesc {
        address,
        attributes: ty,
        max_packet_size: 512,
        interval: 0,
    }
}

pub fn bulk(address: u8) -> EndpDesc {
    endpoint(address, BULK)
}

pub fn interface(number: u8, class: u8, endpoints: &[EndpDesc]) -> IfDesc {
    IfDesc {
        number,
        alternate_setting: 0,
        class,
        sub_class: 0,
        protocol: 0,
        interface_str: 0,
        endpoints: endpoints.iter().copied().collect(),
    }
}

pub fn config(value: u8, interfaces: Vec<IfDesc>) -> ConfDesc {
    ConfDesc {
        configuration_value: value,
        configuration_str: 0,
        attributes: 0xc0,
        max_power: 1,
        interface_descs: interfaces.into_iter().collect(),
    }
}

/// The layout of a phone in download mode: a CDC ACM pair with bulk endpoints 0x81 and 0x01.
pub fn odin_configs() -> Vec<ConfDesc> {
    vec![config(
        1,
        vec![
            interface(0, CDC_COMM, &[endpoint(0x83, INTERRUPT)]),
            interface(1, CDC_DATA, &[bulk(0x81), bulk(0x01)]),
        ],
    )]
}

pub fn driver() -> OdinDriver<FakeDevice> {
    OdinDriver::init(&HeapAllocator).unwrap()
}

/// A driver that was started on an ODIN device, together with its journal.
pub fn started() -> (OdinDriver<FakeDevice>, SharedJournal) {
    let journal = SharedJournal::default();
    let device = FakeDevice::new(&journal, odin_configs());
    let provider = Provider::UsbDevice(device);

    let mut driver = driver();
    driver.attach(&provider);
    driver.start(provider).unwrap();
    (driver, journal)
}
