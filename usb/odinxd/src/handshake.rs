use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::buffer::BufferSlot;
use crate::dispatch::Dispatcher;
use crate::error::SubmitError;
use crate::host::Pipe;

/// Sent by the host once both transfers are set up.
pub const PROBE: [u8; 4] = *b"ODIN";
/// Sent back by a device in download mode.
pub const REPLY: [u8; 4] = *b"LOKE";

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum HandshakeState {
    NotStarted = 0,
    ProbeSent = 1,
    Complete = 2,
}

impl HandshakeState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::NotStarted,
            1 => Self::ProbeSent,
            _ => Self::Complete,
        }
    }
}

/// The handshake progress, shared between the submitter and completion threads. It only ever
/// moves forward.
#[derive(Debug)]
pub struct Handshake {
    state: AtomicU8,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(HandshakeState::NotStarted as u8),
        }
    }
    pub fn state(&self) -> HandshakeState {
        HandshakeState::from_raw(self.state.load(Ordering::Acquire))
    }
    pub fn is_complete(&self) -> bool {
        self.state() == HandshakeState::Complete
    }

    fn advance(&self, from: HandshakeState, to: HandshakeState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Records that the probe was queued. Does nothing if the reply already arrived.
    pub(crate) fn mark_probe_sent(&self) -> bool {
        self.advance(HandshakeState::NotStarted, HandshakeState::ProbeSent)
    }

    /// Checks the first bytes received on the input channel, returning whether this call
    /// completed the handshake.
    pub(crate) fn accept_reply(&self, received: &[u8]) -> bool {
        if received.len() < REPLY.len() || received[..REPLY.len()] != REPLY {
            debug!(
                "input of {} bytes is not a handshake reply: {:02x?}",
                received.len(),
                &received[..received.len().min(REPLY.len())]
            );
            return false;
        }
        // the reply may race the bookkeeping after the probe submission
        self.advance(HandshakeState::ProbeSent, HandshakeState::Complete)
            || self.advance(HandshakeState::NotStarted, HandshakeState::Complete)
    }
}

/// Writes the probe into the output buffer and queues it on `out_pipe`.
pub fn send_probe<P: Pipe + ?Sized>(
    dispatcher: &Arc<Dispatcher>,
    out_pipe: &P,
) -> Result<(), SubmitError> {
    let output = dispatcher.buffer(BufferSlot::Output);
    if output.is_outstanding() {
        return Err(SubmitError::Busy {
            slot: BufferSlot::Output,
        });
    }
    if output.capacity() < PROBE.len() {
        return Err(SubmitError::TooLong {
            slot: BufferSlot::Output,
            length: PROBE.len(),
            capacity: output.capacity(),
        });
    }
    output
        .mem()
        .write(|mem| mem[..PROBE.len()].copy_from_slice(&PROBE));

    dispatcher.submit(out_pipe, BufferSlot::Output, PROBE.len())?;
    dispatcher.handshake().mark_probe_sent();
    info!("sent handshake probe on pipe {:#04x}", out_pipe.address());
    Ok(())
}
