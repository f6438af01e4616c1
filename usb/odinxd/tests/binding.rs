mod common;

use crate::common::*;
use odinx::{BindError, DriverState, HandshakeState, HostError, ProbeResult, Provider};

fn start(device: FakeDevice) -> (odinx::OdinDriver<FakeDevice>, Result<(), BindError>) {
    let provider = Provider::UsbDevice(device);
    let mut driver = driver();
    driver.attach(&provider);
    let result = driver.start(provider);
    (driver, result)
}

#[test]
fn first_bulk_endpoint_per_direction_wins() {
    let journal = SharedJournal::default();
    let device = FakeDevice::new(
        &journal,
        vec![config(
            1,
            vec![interface(
                0,
                CDC_DATA,
                &[bulk(0x81), bulk(0x82), bulk(0x01), bulk(0x02)],
            )],
        )],
    );
    let (driver, result) = start(device);
    result.unwrap();

    assert_eq!(driver.in_pipe().map(|p| odinx::Pipe::address(p)), Some(0x81));
    assert_eq!(driver.out_pipe().map(|p| odinx::Pipe::address(p)), Some(0x01));
    assert_eq!(journal.lock().opened_pipes, vec![0x81, 0x01]);
}

#[test]
fn only_bulk_endpoints_of_data_interfaces_are_used() {
    let journal = SharedJournal::default();
    let mut device = FakeDevice::new(
        &journal,
        vec![config(
            1,
            vec![
                interface(0, 0xff, &[bulk(0x84), bulk(0x04)]),
                interface(1, CDC_COMM, &[bulk(0x85), endpoint(0x83, INTERRUPT)]),
                interface(2, CDC_DATA, &[endpoint(0x86, INTERRUPT), bulk(0x81), bulk(0x01)]),
            ],
        )],
    );
    device.other_children.push("audio".to_string());
    let (driver, result) = start(device);
    result.unwrap();

    assert_eq!(driver.state(), DriverState::Running);
    assert_eq!(journal.lock().opened_pipes, vec![0x81, 0x01]);
}

#[test]
fn missing_direction_leaves_no_pipe() {
    let journal = SharedJournal::default();
    let device = FakeDevice::new(
        &journal,
        vec![config(1, vec![interface(0, CDC_DATA, &[bulk(0x81)])])],
    );
    let (driver, result) = start(device);

    assert!(matches!(
        result,
        Err(BindError::MissingEndpoints {
            input: true,
            output: false
        })
    ));
    assert!(driver.in_pipe().is_none());
    assert!(driver.out_pipe().is_none());
    assert!(driver.device().is_none());
    assert_eq!(driver.state(), DriverState::Attached);
    assert_eq!(driver.handshake_state(), HandshakeState::NotStarted);

    let journal = journal.lock();
    assert_eq!(journal.opened_pipes, vec![0x81]);
    assert_eq!(journal.released_pipes, vec![0x81]);
    assert!(journal.submissions.is_empty());
    assert_eq!(journal.closes, 1);
    assert_eq!(journal.device_drops, 1);
}

#[test]
fn no_configurations_is_fatal() {
    let journal = SharedJournal::default();
    let device = FakeDevice::new(&journal, Vec::new());
    let (_driver, result) = start(device);

    assert!(matches!(result, Err(BindError::NoConfigurations)));
    assert!(journal.lock().opened_pipes.is_empty());
}

#[test]
fn later_configuration_fills_missing_directions() {
    let journal = SharedJournal::default();
    let device = FakeDevice::new(
        &journal,
        vec![
            config(1, vec![interface(0, CDC_DATA, &[bulk(0x81), endpoint(0x02, INTERRUPT)])]),
            config(2, vec![interface(0, CDC_DATA, &[bulk(0x83), bulk(0x03)])]),
        ],
    );
    let (driver, result) = start(device);
    result.unwrap();

    assert_eq!(driver.in_pipe().map(|p| odinx::Pipe::address(p)), Some(0x81));
    assert_eq!(driver.out_pipe().map(|p| odinx::Pipe::address(p)), Some(0x03));
    let journal = journal.lock();
    assert_eq!(journal.configurations_set, vec![1, 2]);
    assert_eq!(journal.opened_pipes, vec![0x81, 0x03]);
}

#[test]
fn scan_stops_once_both_pipes_are_bound() {
    let journal = SharedJournal::default();
    let mut configs = odin_configs();
    configs.push(config(2, vec![interface(0, CDC_DATA, &[bulk(0x83), bulk(0x03)])]));
    let device = FakeDevice::new(&journal, configs);
    let (_driver, result) = start(device);
    result.unwrap();

    assert_eq!(journal.lock().configurations_set, vec![1]);
}

#[test]
fn exclusive_access_scans_the_current_configuration() {
    let journal = SharedJournal::default();
    let mut device = FakeDevice::new(&journal, odin_configs());
    device.open_behavior = OpenBehavior::Exclusive;
    let (mut driver, result) = start(device);
    result.unwrap();

    assert_eq!(driver.state(), DriverState::Running);
    assert!(journal.lock().configurations_set.is_empty());

    driver.stop();
    let journal = journal.lock();
    assert_eq!(journal.closes, 0);
    assert_eq!(journal.device_drops, 1);
}

#[test]
fn open_failure_is_fatal() {
    let journal = SharedJournal::default();
    let mut device = FakeDevice::new(&journal, odin_configs());
    device.open_behavior = OpenBehavior::Fail;
    let (driver, result) = start(device);

    assert!(matches!(result, Err(BindError::Open(HostError::Refused(_)))));
    assert_eq!(driver.state(), DriverState::Attached);
    assert!(journal.lock().opened_pipes.is_empty());
}

#[test]
fn only_usb_devices_are_accepted() {
    let mut driver = driver();
    let interface = Provider::UsbInterface(interface(1, CDC_DATA, &[bulk(0x81), bulk(0x01)]));
    let other = Provider::Other("pci device");

    assert_eq!(driver.probe(&interface, 1000), ProbeResult::Reject);
    assert_eq!(driver.probe(&other, 1000), ProbeResult::Reject);
    assert!(matches!(
        driver.start(interface),
        Err(BindError::NotUsbDevice("usb interface"))
    ));

    let journal = SharedJournal::default();
    let device = Provider::UsbDevice(FakeDevice::new(&journal, odin_configs()));
    assert_eq!(driver.probe(&device, 1000), ProbeResult::Accept);
}

#[test]
fn running_driver_cannot_start_again() {
    let (mut driver, _journal) = started();
    let journal = SharedJournal::default();
    let again = Provider::UsbDevice(FakeDevice::new(&journal, odin_configs()));

    assert!(matches!(
        driver.start(again),
        Err(BindError::InvalidState(DriverState::Running))
    ));
    assert!(journal.lock().opened_pipes.is_empty());
}
