use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use log::{debug, error, info, trace, warn};

use crate::buffer::{BufferSlot, TransferBuffer, TransferBuffers};
use crate::error::SubmitError;
use crate::handshake::Handshake;
use crate::host::{Pipe, TransferStatus};

/// Notifications for whoever runs the driver.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DriverEvent {
    HandshakeComplete,
    TransferComplete {
        slot: BufferSlot,
        status: TransferStatus,
        transferred: usize,
    },
}

/// Owns both transfer buffers and interprets every completion.
#[derive(Debug)]
pub struct Dispatcher {
    buffers: TransferBuffers,
    handshake: Arc<Handshake>,
    torn_down: AtomicBool,
    events: Option<Sender<DriverEvent>>,
}

impl Dispatcher {
    /// The handshake is shared so that its progress outlives the buffers.
    pub fn new(
        buffers: TransferBuffers,
        handshake: Arc<Handshake>,
        events: Option<Sender<DriverEvent>>,
    ) -> Self {
        Self {
            buffers,
            handshake,
            torn_down: AtomicBool::new(false),
            events,
        }
    }

    pub fn buffer(&self, slot: BufferSlot) -> &TransferBuffer {
        self.buffers.get(slot)
    }
    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// After this, completions are ignored and nothing new can be submitted.
    pub fn tear_down(&self) {
        self.torn_down.store(true, Ordering::Release);
    }
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Queues a transfer of `length` bytes from `slot`'s buffer on `pipe`.
    pub fn submit<P: Pipe + ?Sized>(
        self: &Arc<Self>,
        pipe: &P,
        slot: BufferSlot,
        length: usize,
    ) -> Result<(), SubmitError> {
        if self.is_torn_down() {
            return Err(SubmitError::TornDown);
        }
        let buffer = self.buffer(slot);
        if length > buffer.capacity() {
            return Err(SubmitError::TooLong {
                slot,
                length,
                capacity: buffer.capacity(),
            });
        }
        if !buffer.begin(length) {
            return Err(SubmitError::Busy { slot });
        }

        let context = CompletionContext {
            owner: Arc::clone(self),
            slot,
        };
        trace!(
            "submitting {} bytes on pipe {:#04x} ({:?})",
            length,
            pipe.address(),
            slot
        );
        if let Err(err) = pipe.io(buffer.mem(), length, context) {
            buffer.finish();
            return Err(SubmitError::Pipe(err));
        }
        Ok(())
    }

    /// Handles the completion of the transfer outstanding on `slot`. `remaining` is the number
    /// of requested bytes that were not transferred.
    pub fn io_complete(&self, slot: BufferSlot, status: TransferStatus, remaining: usize) {
        let buffer = self.buffer(slot);
        let requested = buffer.finish();

        if self.is_torn_down() {
            debug!(
                "ignoring {:?} completion ({:?}) after teardown",
                slot, status
            );
            return;
        }

        let transferred = requested.saturating_sub(remaining);
        match slot {
            BufferSlot::Input => {
                debug!(
                    "input completion: {:?}, {} bytes transferred",
                    status, transferred
                );
                if !status.carries_data() {
                    warn!("input transfer ended with {:?}", status);
                } else if self.handshake.is_complete() {
                    trace!("handshake already complete, {} bytes unread", transferred);
                } else {
                    let accepted = buffer.mem().read(|mem| {
                        let received = &mem[..transferred.min(mem.len())];
                        self.handshake.accept_reply(received)
                    });
                    if accepted {
                        info!("handshake complete");
                        self.notify(DriverEvent::HandshakeComplete);
                    }
                }
            }
            BufferSlot::Output => {
                if status.carries_data() {
                    debug!(
                        "output completion: {:?}, {} bytes transferred",
                        status, transferred
                    );
                } else {
                    warn!("output transfer ended with {:?}", status);
                }
            }
        }

        self.notify(DriverEvent::TransferComplete {
            slot,
            status,
            transferred,
        });
    }

    fn notify(&self, event: DriverEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                error!("event receiver is gone, dropping {:?}", event);
            }
        }
    }
}

/// Identifies the one transfer it was created for. Completing consumes it.
#[derive(Debug)]
pub struct CompletionContext {
    owner: Arc<Dispatcher>,
    slot: BufferSlot,
}

impl CompletionContext {
    pub fn slot(&self) -> BufferSlot {
        self.slot
    }
    pub fn complete(self, status: TransferStatus, remaining: usize) {
        self.owner.io_complete(self.slot, status, remaining);
    }
}
