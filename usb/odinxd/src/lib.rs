//! Host-side driver for devices in ODIN download mode.
//!
//! The driver claims the CDC data interface of a matching device, opens one bulk pipe in
//! each direction and performs the `ODIN`/`LOKE` handshake over them. Everything it needs
//! from the USB host is behind the traits in [`host`], so the same core runs on the
//! controller daemon's scheme ([`scheme::SchemeHost`]) and on test doubles.

pub mod buffer;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod handshake;
pub mod host;
pub mod matching;
pub mod pipe;
pub mod scan;
pub mod scheme;

pub use buffer::{BufferSlot, DmaBuffer};
pub use dispatch::{CompletionContext, Dispatcher, DriverEvent};
pub use driver::{DriverState, OdinDriver};
pub use error::{BindError, HostError, SubmitError};
pub use handshake::{HandshakeState, PROBE, REPLY};
pub use host::{
    BufferAllocator, Child, HeapAllocator, Pipe, ProbeResult, Provider, TransferStatus, UsbHost,
    PAGE_SIZE,
};
