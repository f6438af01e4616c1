mod common;

use std::thread;

use crate::common::*;
use odinx::{
    BufferSlot, DriverEvent, DriverState, HandshakeState, HeapAllocator, OdinDriver, Pipe,
    Provider, TransferStatus, PAGE_SIZE,
};

#[test]
fn download_mode_device_end_to_end() {
    let journal = SharedJournal::default();
    let device = FakeDevice::new(
        &journal,
        vec![config(1, vec![interface(0, CDC_DATA, &[bulk(0x81), bulk(0x01)])])],
    );
    let provider = Provider::UsbDevice(device);
    let mut driver = crate::common::driver();

    assert!(driver.attach(&provider));
    assert!(driver.start(provider).is_ok());
    assert_eq!(driver.in_pipe().map(Pipe::address), Some(0x81));
    assert_eq!(driver.out_pipe().map(Pipe::address), Some(0x01));

    let dispatcher = driver.dispatcher().unwrap();
    assert_eq!(dispatcher.buffer(BufferSlot::Output).mem().to_vec(4), b"ODIN");
    assert_eq!(driver.handshake_state(), HandshakeState::ProbeSent);

    let input = journal.take_pending(0x81);
    input.buffer.write(|mem| mem[..4].copy_from_slice(b"LOKE"));
    input.context.complete(TransferStatus::Success, PAGE_SIZE - 4);
    assert_eq!(driver.handshake_state(), HandshakeState::Complete);
}

#[test]
fn input_is_queued_before_the_probe() {
    let (driver, journal) = started();
    let journal = journal.lock();

    assert_eq!(journal.submissions.len(), 2);
    let input = &journal.submissions[0];
    assert_eq!((input.address, input.length), (0x81, PAGE_SIZE));
    let probe = &journal.submissions[1];
    assert_eq!((probe.address, probe.length), (0x01, 4));
    assert_eq!(probe.data, b"ODIN");

    assert_eq!(driver.state(), DriverState::Running);
    assert_eq!(driver.handshake_state(), HandshakeState::ProbeSent);
}

#[test]
fn reply_completes_the_handshake() {
    let (driver, journal) = started();

    journal.take_pending(0x01).finish(TransferStatus::Success);
    assert_eq!(driver.handshake_state(), HandshakeState::ProbeSent);

    journal
        .take_pending(0x81)
        .receive(b"LOKE", TransferStatus::ShortPacket);
    assert_eq!(driver.handshake_state(), HandshakeState::Complete);
}

#[test]
fn reply_may_arrive_before_the_probe_completes() {
    let (driver, journal) = started();

    journal
        .take_pending(0x81)
        .receive(b"LOKE", TransferStatus::ShortPacket);
    assert_eq!(driver.handshake_state(), HandshakeState::Complete);

    journal.take_pending(0x01).finish(TransferStatus::Success);
    assert_eq!(driver.handshake_state(), HandshakeState::Complete);
}

#[test]
fn short_replies_do_not_complete() {
    let (driver, journal) = started();
    journal
        .take_pending(0x81)
        .receive(b"LOK", TransferStatus::ShortPacket);
    assert_eq!(driver.handshake_state(), HandshakeState::ProbeSent);

    let (driver, journal) = started();
    journal
        .take_pending(0x81)
        .receive(b"LO", TransferStatus::ShortPacket);
    assert_eq!(driver.handshake_state(), HandshakeState::ProbeSent);
}

#[test]
fn wrong_reply_does_not_complete() {
    let (driver, journal) = started();
    journal
        .take_pending(0x81)
        .receive(b"ODIN", TransferStatus::ShortPacket);
    assert_eq!(driver.handshake_state(), HandshakeState::ProbeSent);
}

#[test]
fn failed_input_is_not_interpreted() {
    for status in [
        TransferStatus::Stalled,
        TransferStatus::Aborted,
        TransferStatus::Error,
    ] {
        let (driver, journal) = started();
        journal.take_pending(0x81).receive(b"LOKE", status);
        assert_eq!(driver.handshake_state(), HandshakeState::ProbeSent);
    }
}

#[test]
fn completion_is_idempotent() {
    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let journal = SharedJournal::default();
    let provider = Provider::UsbDevice(FakeDevice::new(&journal, odin_configs()));
    let mut driver = OdinDriver::init_with_events(&HeapAllocator, events_tx).unwrap();
    driver.attach(&provider);
    driver.start(provider).unwrap();

    journal
        .take_pending(0x81)
        .receive(b"LOKE", TransferStatus::ShortPacket);

    let dispatcher = driver.dispatcher().unwrap();
    dispatcher
        .submit(driver.in_pipe().unwrap(), BufferSlot::Input, PAGE_SIZE)
        .unwrap();
    journal
        .take_pending(0x81)
        .receive(b"LOKE", TransferStatus::ShortPacket);
    assert_eq!(driver.handshake_state(), HandshakeState::Complete);

    let handshakes = events_rx
        .try_iter()
        .filter(|event| *event == DriverEvent::HandshakeComplete)
        .count();
    assert_eq!(handshakes, 1);
}

#[test]
fn completions_from_other_threads() {
    let (driver, journal) = started();
    let input = journal.take_pending(0x81);
    let output = journal.take_pending(0x01);

    let input = thread::spawn(move || input.receive(b"LOKE", TransferStatus::ShortPacket));
    let output = thread::spawn(move || output.finish(TransferStatus::Success));
    input.join().unwrap();
    output.join().unwrap();

    assert_eq!(driver.handshake_state(), HandshakeState::Complete);
    let dispatcher = driver.dispatcher().unwrap();
    assert!(!dispatcher.buffer(BufferSlot::Input).is_outstanding());
    assert!(!dispatcher.buffer(BufferSlot::Output).is_outstanding());
}

#[test]
fn stalled_handshake_stays_probe_sent() {
    let (driver, journal) = started();
    journal.take_pending(0x01).finish(TransferStatus::Success);

    assert_eq!(driver.handshake_state(), HandshakeState::ProbeSent);
    assert_eq!(driver.state(), DriverState::Running);
    assert_eq!(journal.lock().pending.len(), 1);
}
