//! USB Host Client Interface
//!
//! This crate implements the interface USB class drivers use to talk to the host controller
//! daemon from another userspace process: a model of the standard descriptors a device
//! reports, a parser for the raw descriptor bytes, and a client handle to the controller's
//! per-port scheme.
//!
//! The controller daemon exposes every port as a directory in its scheme:
//!
//! - `portN/state` - the current port state, as text (see [PortState])
//! - `portN/request` - control transfers, one JSON [PortReq] followed by the data stage
//! - `portN/configure` - endpoint configuration, one JSON [ConfigureEndpointsReq]
//! - `portN/endpoints/M/{ctl,data}` - non-control endpoint `M`
//!
//! This documentation refers directly to the relevant standards:
//!
//! - USB2  - [Universal Serial Bus Specification](https://www.usb.org/document-library/usb-20-specification)
//! - USB32 - [Universal Serial Bus 3.2 Specification Revision 1.1](https://usb.org/document-library/usb-32-revision-11-june-2022)
//!
pub extern crate plain;
pub extern crate serde;
pub extern crate smallvec;

mod client;
mod desc;
pub mod usb;

pub use client::*;
pub use desc::*;
