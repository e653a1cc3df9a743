//! Tray interface for the headset indicator.
//!
//! This crate does not link a widget toolkit. It renders engine snapshots
//! into the labels a tray backend needs and carries user gestures back over
//! channels:
//! - [`TrayEvent`]: gestures from the tray to the indicator
//! - [`TrayUpdate`]: menu state and notices from the indicator to the tray
//!
//! The GUI backend owns the other end of both channels and usually runs on
//! the main thread.

mod menu;
mod tray;

pub use menu::{DEFAULT_VOLUME_STEP, MenuAction, MenuItem, MenuState};
pub use tray::{TrayConfig, TrayEvent, TrayHandle, TrayUpdate};
