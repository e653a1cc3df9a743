//! Tray handle, events, and update types.
//!
//! The actual tray icon needs a platform GUI backend. This module defines
//! the channel-based interface the indicator uses to talk to it, independent
//! of that backend.

use std::sync::mpsc;

use hscompanion_engine::DeviceSnapshot;

use crate::menu::{DEFAULT_VOLUME_STEP, MenuAction, MenuState};

/// Configuration for the tray.
#[derive(Debug, Clone)]
pub struct TrayConfig {
    /// Percentage points per volume up/down click.
    pub volume_step: u8,
}

impl Default for TrayConfig {
    fn default() -> Self {
        Self {
            volume_step: DEFAULT_VOLUME_STEP,
        }
    }
}

/// Events emitted by the tray to the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayEvent {
    /// Slider moved to an absolute percentage.
    VolumeSet(u8),
    /// Absolute percentage entered as one settled value.
    VolumeEntered(u8),
    /// Relative volume change in percentage points.
    VolumeStep(i8),
    MuteToggled,
    SetDefaultOutput,
    ResyncRequested,
    QuitRequested,
}

impl TrayEvent {
    /// Maps a clicked menu item to the event the tray sends, using the step
    /// carried by the last [`MenuState`] it rendered.
    pub fn from_action(action: MenuAction, volume_step: u8) -> Self {
        let step = i8::try_from(volume_step).unwrap_or(i8::MAX);
        match action {
            MenuAction::VolumeUp => Self::VolumeStep(step),
            MenuAction::VolumeDown => Self::VolumeStep(-step),
            MenuAction::ToggleMute => Self::MuteToggled,
            MenuAction::UseAsOutput => Self::SetDefaultOutput,
            MenuAction::Resync => Self::ResyncRequested,
            MenuAction::Quit => Self::QuitRequested,
        }
    }
}

/// Updates sent from the indicator to the tray.
#[derive(Debug, Clone)]
pub enum TrayUpdate {
    /// Re-render the icon, tooltip and menu.
    Snapshot(MenuState),
    /// Show a transient notice.
    Notice { title: String, message: String },
    /// Request tray shutdown.
    Shutdown,
}

/// Handle for communicating with the tray from the indicator.
///
/// This is the async-safe side of the interface. The tray event loop runs on
/// the GUI thread and communicates via channels.
pub struct TrayHandle {
    update_tx: mpsc::Sender<TrayUpdate>,
    event_rx: mpsc::Receiver<TrayEvent>,
    /// Last state sent to the tray.
    state: MenuState,
    config: TrayConfig,
}

impl TrayHandle {
    /// Creates a new tray handle with its channel pair.
    ///
    /// Returns `(handle, event_sender, update_receiver)`; the sender/receiver
    /// pair is given to the tray event loop.
    pub fn new(config: TrayConfig) -> (Self, mpsc::Sender<TrayEvent>, mpsc::Receiver<TrayUpdate>) {
        let (update_tx, update_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        let handle = Self {
            update_tx,
            event_rx,
            state: MenuState::from_snapshot(&DeviceSnapshot::default(), config.volume_step),
            config,
        };

        (handle, event_tx, update_rx)
    }

    pub fn config(&self) -> &TrayConfig {
        &self.config
    }

    /// Pushes a snapshot to the tray if it changes what the tray shows.
    ///
    /// Returns `true` when an update was sent.
    pub fn update_snapshot(&mut self, snapshot: &DeviceSnapshot) -> bool {
        let state = MenuState::from_snapshot(snapshot, self.config.volume_step);
        if state == self.state {
            return false;
        }
        tracing::trace!(status = state.status_label(), volume = ?state.volume_percent, "tray update");
        self.state = state.clone();
        let _ = self.update_tx.send(TrayUpdate::Snapshot(state));
        true
    }

    /// Shows a transient notice next to the tray.
    pub fn show_notice(&self, title: &str, message: &str) {
        let _ = self.update_tx.send(TrayUpdate::Notice {
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    /// Requests the tray to shut down.
    pub fn shutdown(&self) {
        let _ = self.update_tx.send(TrayUpdate::Shutdown);
    }

    /// Tries to receive a tray event (non-blocking).
    pub fn try_recv_event(&self) -> Option<TrayEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Returns the last state sent to the tray.
    pub fn state(&self) -> &MenuState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use hscompanion_engine::LinkState;

    use super::*;

    #[test]
    fn tray_handle_creation() {
        let (handle, _event_tx, _update_rx) = TrayHandle::new(TrayConfig::default());
        assert_eq!(handle.state().link, LinkState::Unknown);
        assert_eq!(handle.state().volume_step, DEFAULT_VOLUME_STEP);
    }

    #[test]
    fn configured_step_reaches_menu_state() {
        let config = TrayConfig { volume_step: 10 };
        let (handle, _event_tx, _update_rx) = TrayHandle::new(config);

        let state = handle.state();
        assert_eq!(state.volume_step, 10);
        assert_eq!(
            TrayEvent::from_action(MenuAction::VolumeDown, state.volume_step),
            TrayEvent::VolumeStep(-10)
        );
    }

    #[test]
    fn unchanged_snapshot_is_not_resent() {
        let (mut handle, _event_tx, update_rx) = TrayHandle::new(TrayConfig::default());

        // The initial state already matches a default snapshot.
        assert!(!handle.update_snapshot(&DeviceSnapshot::default()));
        assert!(update_rx.try_recv().is_err());
    }

    #[test]
    fn tray_handle_notice() {
        let (handle, _event_tx, update_rx) = TrayHandle::new(TrayConfig::default());

        handle.show_notice("HS Companion", "Volume updated");
        match update_rx.recv().unwrap() {
            TrayUpdate::Notice { title, message } => {
                assert_eq!(title, "HS Companion");
                assert_eq!(message, "Volume updated");
            }
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[test]
    fn tray_handle_events() {
        let (handle, event_tx, _update_rx) = TrayHandle::new(TrayConfig::default());

        assert!(handle.try_recv_event().is_none());

        event_tx.send(TrayEvent::VolumeSet(40)).unwrap();
        event_tx.send(TrayEvent::QuitRequested).unwrap();
        assert_eq!(handle.try_recv_event(), Some(TrayEvent::VolumeSet(40)));
        assert_eq!(handle.try_recv_event(), Some(TrayEvent::QuitRequested));
    }

    #[test]
    fn tray_handle_shutdown() {
        let (handle, _event_tx, update_rx) = TrayHandle::new(TrayConfig::default());

        handle.shutdown();
        let update = update_rx.recv().unwrap();
        assert!(matches!(update, TrayUpdate::Shutdown));
    }

    #[test]
    fn menu_actions_map_to_events() {
        assert_eq!(
            TrayEvent::from_action(MenuAction::VolumeUp, 5),
            TrayEvent::VolumeStep(5)
        );
        assert_eq!(
            TrayEvent::from_action(MenuAction::VolumeDown, 5),
            TrayEvent::VolumeStep(-5)
        );
        assert_eq!(
            TrayEvent::from_action(MenuAction::UseAsOutput, 5),
            TrayEvent::SetDefaultOutput
        );
        assert_eq!(
            TrayEvent::from_action(MenuAction::VolumeUp, 200),
            TrayEvent::VolumeStep(i8::MAX)
        );
    }
}
