//! Context menu rendered from the device snapshot.

use hscompanion_engine::{DeviceSnapshot, LinkState};

/// Actions that can be triggered from the tray context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    VolumeUp,
    VolumeDown,
    ToggleMute,
    /// Make the headset the default audio output.
    UseAsOutput,
    Resync,
    Quit,
}

/// A single menu item.
#[derive(Debug, Clone)]
pub struct MenuItem {
    /// Display text.
    pub label: String,
    /// Whether the item is enabled (clickable).
    pub enabled: bool,
    /// Optional action triggered on click.
    pub action: Option<MenuAction>,
}

impl MenuItem {
    fn info(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            enabled: false,
            action: None,
        }
    }

    fn separator() -> Self {
        Self::info(String::new())
    }

    fn action(label: impl Into<String>, enabled: bool, action: MenuAction) -> Self {
        Self {
            label: label.into(),
            enabled,
            action: Some(action),
        }
    }
}

/// What the tray shows for one device snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuState {
    pub link: LinkState,
    pub device_name: Option<String>,
    /// `None` until the headset has reported a volume.
    pub volume_percent: Option<u8>,
    pub muted: bool,
    /// The headset's audio server sink is known.
    pub has_sink: bool,
    /// Percentage points per volume up/down click.
    pub volume_step: u8,
}

/// Step used when none is configured.
pub const DEFAULT_VOLUME_STEP: u8 = 5;

impl Default for MenuState {
    fn default() -> Self {
        Self::from_snapshot(&DeviceSnapshot::default(), DEFAULT_VOLUME_STEP)
    }
}

impl MenuState {
    pub fn from_snapshot(snapshot: &DeviceSnapshot, volume_step: u8) -> Self {
        Self {
            link: snapshot.link(),
            device_name: snapshot.device_name().map(str::to_string),
            volume_percent: snapshot.volume_percent(),
            muted: snapshot.is_muted(),
            has_sink: snapshot.sink_id().is_some(),
            volume_step,
        }
    }

    fn connected(&self) -> bool {
        self.link == LinkState::Connected
    }

    /// Live reading: connected with a known volume.
    fn live_volume(&self) -> Option<u8> {
        self.volume_percent.filter(|_| self.connected())
    }

    pub fn status_label(&self) -> &'static str {
        match self.link {
            LinkState::Connected => "Connected",
            LinkState::Disconnected => "Not found",
            LinkState::Unknown => "Detecting...",
        }
    }

    /// `Volume: 55%`, or `Volume: --%` when there is no live reading.
    pub fn volume_label(&self) -> String {
        match self.live_volume() {
            Some(volume) => format!("Volume: {volume}%"),
            None => "Volume: --%".into(),
        }
    }

    /// Slider position in `0.0..=1.0`.
    pub fn slider_fraction(&self) -> f64 {
        self.live_volume()
            .map_or(0.0, |volume| f64::from(volume) / 100.0)
    }

    pub fn mute_label(&self) -> &'static str {
        if self.muted { "Unmute" } else { "Mute" }
    }

    /// "Use as audio output" needs a live headset with a resolved sink.
    pub fn can_use_as_output(&self) -> bool {
        self.connected() && self.has_sink
    }

    /// Freedesktop icon name for the tray icon.
    pub fn icon_name(&self) -> &'static str {
        match self.link {
            LinkState::Connected if self.muted => "audio-volume-muted-symbolic",
            LinkState::Connected => "audio-headphones-symbolic",
            LinkState::Disconnected => "action-unavailable-symbolic",
            LinkState::Unknown => "content-loading-symbolic",
        }
    }

    /// Tooltip text, e.g. `H878 Wireless headset: 55%`.
    pub fn tooltip(&self) -> String {
        let name = self.device_name.as_deref().unwrap_or("Headset");
        match self.live_volume() {
            Some(volume) => format!("{name}: {volume}%"),
            None => format!("{name}: {}", self.status_label()),
        }
    }

    /// Builds the menu items from the current state.
    pub fn build_menu(&self) -> Vec<MenuItem> {
        let connected = self.connected();
        let name = self.device_name.as_deref().unwrap_or("Headset");

        vec![
            MenuItem::info(format!("{name}: {}", self.status_label())),
            MenuItem::info(self.volume_label()),
            MenuItem::separator(),
            MenuItem::action(
                format!("Volume up (+{}%)", self.volume_step),
                connected,
                MenuAction::VolumeUp,
            ),
            MenuItem::action(
                format!("Volume down (-{}%)", self.volume_step),
                connected,
                MenuAction::VolumeDown,
            ),
            MenuItem::action(self.mute_label(), connected, MenuAction::ToggleMute),
            MenuItem::action(
                "Use as audio output",
                self.can_use_as_output(),
                MenuAction::UseAsOutput,
            ),
            MenuItem::separator(),
            MenuItem::action("Sync now", true, MenuAction::Resync),
            MenuItem::action("Quit", true, MenuAction::Quit),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected(volume: u8, sink: bool) -> MenuState {
        MenuState {
            link: LinkState::Connected,
            device_name: Some("H878 Wireless headset".into()),
            volume_percent: Some(volume),
            muted: volume == 0,
            has_sink: sink,
            volume_step: DEFAULT_VOLUME_STEP,
        }
    }

    fn find(items: &[MenuItem], action: MenuAction) -> &MenuItem {
        items
            .iter()
            .find(|i| i.action == Some(action))
            .unwrap()
    }

    #[test]
    fn default_state_is_detecting() {
        let state = MenuState::default();
        assert_eq!(state.link, LinkState::Unknown);
        assert_eq!(state.status_label(), "Detecting...");
        assert_eq!(state.volume_label(), "Volume: --%");
        assert_eq!(state.slider_fraction(), 0.0);
        assert!(!state.can_use_as_output());
    }

    #[test]
    fn connected_labels() {
        let state = connected(55, true);
        assert_eq!(state.status_label(), "Connected");
        assert_eq!(state.volume_label(), "Volume: 55%");
        assert!((state.slider_fraction() - 0.55).abs() < f64::EPSILON);
        assert_eq!(state.mute_label(), "Mute");
        assert_eq!(state.icon_name(), "audio-headphones-symbolic");
        assert_eq!(state.tooltip(), "H878 Wireless headset: 55%");
    }

    #[test]
    fn muted_labels() {
        let state = connected(0, true);
        assert_eq!(state.mute_label(), "Unmute");
        assert_eq!(state.icon_name(), "audio-volume-muted-symbolic");
    }

    #[test]
    fn disconnected_hides_stale_volume() {
        let state = MenuState {
            link: LinkState::Disconnected,
            device_name: None,
            volume_percent: Some(80),
            muted: false,
            has_sink: false,
            volume_step: DEFAULT_VOLUME_STEP,
        };
        assert_eq!(state.status_label(), "Not found");
        assert_eq!(state.volume_label(), "Volume: --%");
        assert_eq!(state.tooltip(), "Headset: Not found");
    }

    #[test]
    fn output_item_needs_sink() {
        let items = connected(55, false).build_menu();
        assert!(!find(&items, MenuAction::UseAsOutput).enabled);

        let items = connected(55, true).build_menu();
        assert!(find(&items, MenuAction::UseAsOutput).enabled);
    }

    #[test]
    fn device_actions_disabled_when_not_connected() {
        let items = MenuState::default().build_menu();
        assert!(!find(&items, MenuAction::VolumeUp).enabled);
        assert!(!find(&items, MenuAction::ToggleMute).enabled);
        assert!(find(&items, MenuAction::Resync).enabled);
        assert!(find(&items, MenuAction::Quit).enabled);
    }

    #[test]
    fn connected_without_reading_shows_placeholder() {
        let state = MenuState {
            volume_percent: None,
            muted: false,
            ..connected(0, true)
        };
        assert_eq!(state.volume_label(), "Volume: --%");
        assert_eq!(state.slider_fraction(), 0.0);
        assert_eq!(state.icon_name(), "audio-headphones-symbolic");
        assert_eq!(state.tooltip(), "H878 Wireless headset: Connected");
    }

    #[test]
    fn step_labels_follow_configured_step() {
        let state = MenuState {
            volume_step: 10,
            ..connected(40, true)
        };
        let items = state.build_menu();
        assert_eq!(find(&items, MenuAction::VolumeUp).label, "Volume up (+10%)");
        assert_eq!(find(&items, MenuAction::VolumeDown).label, "Volume down (-10%)");
    }

    #[test]
    fn menu_header_and_quit_last() {
        let items = connected(40, true).build_menu();
        assert_eq!(items[0].label, "H878 Wireless headset: Connected");
        assert_eq!(items[1].label, "Volume: 40%");
        assert_eq!(items.last().unwrap().action, Some(MenuAction::Quit));
    }
}
