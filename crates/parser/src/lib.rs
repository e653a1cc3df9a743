//! Text parsers for the external tools the companion drives.
//!
//! - [`status`]: the headset control script's `status` output.
//! - [`sinks`]: the audio server's short sink listing.
//!
//! Neither parser fails: a missing pattern is a normal negative answer
//! (disconnected headset, unregistered sink), not an error.

pub mod sinks;
pub mod status;

pub use sinks::{DEFAULT_SINK_FRAGMENTS, resolve_sink};
pub use status::{StatusReport, parse_status};
