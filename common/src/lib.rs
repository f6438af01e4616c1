//! Helpers shared by the USB class driver daemons.

mod logger;

pub use logger::{output_level, setup_logging};
