//! Events fanned out to presentation adapters.

use crate::snapshot::DeviceSnapshot;

/// Title used for every user-facing notice.
pub const NOTICE_TITLE: &str = "HS Companion";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A transient, user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: NOTICE_TITLE.into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            title: NOTICE_TITLE.into(),
            message: message.into(),
        }
    }
}

/// Events emitted by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The published snapshot changed.
    SnapshotChanged(DeviceSnapshot),
    /// Something the user should see once.
    Notice(Notice),
    /// The audio server accepted the headset as default output.
    DefaultOutputSet {
        sink: String,
        device_name: Option<String>,
    },
}
