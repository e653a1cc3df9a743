//! Device state synchronization for a wireless headset.
//!
//! The engine polls the headset control script, turns its output into a
//! [`DeviceSnapshot`], applies user volume intents optimistically and writes
//! them back once they settle, and keeps track of the headset's audio server
//! sink. Presentation adapters observe it through [`EngineEvent`]s.
//!
//! All state lives on a single tokio task; see [`SyncEngine`].

mod config;
mod engine;
mod events;
mod snapshot;
mod state;

pub use config::{EngineConfig, MAX_POLL_INTERVAL, MIN_POLL_INTERVAL};
pub use engine::SyncEngine;
pub use events::{EngineEvent, NOTICE_TITLE, Notice, NoticeLevel};
pub use snapshot::{DeviceSnapshot, LinkState};
pub use state::{VolumeInput, VolumeIntent};

/// Errors returned by [`SyncEngine`] control methods.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("sync engine is not running")]
    NotRunning,

    #[error("sync engine already running")]
    AlreadyRunning,

    #[error("sync engine state lock poisoned")]
    Poisoned,
}
