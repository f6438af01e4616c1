use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use usbhost_interface::EndpBinaryDirection;

use crate::error::HostError;
use crate::host::{BufferAllocator, PAGE_SIZE};

/// Memory that a transfer reads from or writes into. Clones share the same memory.
#[derive(Clone, Debug)]
pub struct DmaBuffer {
    mem: Arc<Mutex<Box<[u8]>>>,
    direction: EndpBinaryDirection,
}

impl DmaBuffer {
    pub fn new(direction: EndpBinaryDirection, capacity: usize) -> Self {
        Self {
            mem: Arc::new(Mutex::new(vec![0u8; capacity].into_boxed_slice())),
            direction,
        }
    }
    pub fn capacity(&self) -> usize {
        self.read(|mem| mem.len())
    }
    pub fn direction(&self) -> EndpBinaryDirection {
        self.direction
    }
    pub fn read<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.mem.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
    pub fn write<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.mem.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
    /// Copies out the first `len` bytes, or fewer if the buffer is smaller.
    pub fn to_vec(&self, len: usize) -> Vec<u8> {
        self.read(|mem| mem[..len.min(mem.len())].to_vec())
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BufferSlot {
    Input,
    Output,
}

impl BufferSlot {
    pub const ALL: [BufferSlot; 2] = [BufferSlot::Input, BufferSlot::Output];

    fn index(self) -> usize {
        match self {
            Self::Input => 0,
            Self::Output => 1,
        }
    }
    pub fn direction(self) -> EndpBinaryDirection {
        match self {
            Self::Input => EndpBinaryDirection::In,
            Self::Output => EndpBinaryDirection::Out,
        }
    }
}

#[derive(Debug)]
pub struct TransferBuffer {
    slot: BufferSlot,
    mem: DmaBuffer,
    outstanding: AtomicBool,
    requested: AtomicUsize,
}

impl TransferBuffer {
    fn new(slot: BufferSlot, mem: DmaBuffer) -> Self {
        Self {
            slot,
            mem,
            outstanding: AtomicBool::new(false),
            requested: AtomicUsize::new(0),
        }
    }
    pub fn slot(&self) -> BufferSlot {
        self.slot
    }
    pub fn mem(&self) -> &DmaBuffer {
        &self.mem
    }
    pub fn capacity(&self) -> usize {
        self.mem.capacity()
    }
    pub fn is_outstanding(&self) -> bool {
        self.outstanding.load(Ordering::Acquire)
    }
    /// Marks a transfer of `length` bytes as outstanding, unless one already is.
    pub(crate) fn begin(&self, length: usize) -> bool {
        if self
            .outstanding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.requested.store(length, Ordering::Release);
        true
    }
    /// Clears the outstanding transfer, returning the length it was submitted with.
    pub(crate) fn finish(&self) -> usize {
        let requested = self.requested.load(Ordering::Acquire);
        self.outstanding.store(false, Ordering::Release);
        requested
    }
}

/// The input and output buffers of one driver instance.
#[derive(Debug)]
pub struct TransferBuffers {
    slots: [TransferBuffer; 2],
}

impl TransferBuffers {
    /// Allocates one page for each direction.
    pub fn allocate(alloc: &dyn BufferAllocator) -> Result<Self, HostError> {
        let input = alloc.alloc(BufferSlot::Input.direction(), PAGE_SIZE)?;
        let output = alloc.alloc(BufferSlot::Output.direction(), PAGE_SIZE)?;
        Ok(Self {
            slots: [
                TransferBuffer::new(BufferSlot::Input, input),
                TransferBuffer::new(BufferSlot::Output, output),
            ],
        })
    }
    pub fn get(&self, slot: BufferSlot) -> &TransferBuffer {
        &self.slots[slot.index()]
    }
}
