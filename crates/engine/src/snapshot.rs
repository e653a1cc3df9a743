//! Device snapshot published to presentation adapters.

use hscompanion_parser::StatusReport;
use serde::Serialize;

/// Coarse link state of the headset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// No poll has completed yet.
    #[default]
    Unknown,
    Disconnected,
    Connected,
}

/// The headset as last observed (or optimistically updated).
///
/// Fields are private so the invariants hold for every value that leaves
/// the engine: `muted == (volume_percent == Some(0))`, `device_name` is set iff
/// connected, and `sink_id` is cleared whenever the link drops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    link: LinkState,
    connected: bool,
    device_name: Option<String>,
    volume_percent: Option<u8>,
    muted: bool,
    sink_id: Option<String>,
}

impl Default for DeviceSnapshot {
    fn default() -> Self {
        Self {
            link: LinkState::Unknown,
            connected: false,
            device_name: None,
            volume_percent: None,
            muted: false,
            sink_id: None,
        }
    }
}

impl DeviceSnapshot {
    /// Snapshot from a single detection outside the engine.
    ///
    /// `None` (the status command failed) and a report without a device both
    /// yield a disconnected snapshot.
    pub fn from_report(report: Option<&StatusReport>) -> Self {
        let mut snap = Self::default();
        match report.and_then(|r| r.device_name.clone().map(|name| (name, r.volume_percent))) {
            Some((name, volume)) => {
                snap.connect(name);
                if let Some(volume) = volume {
                    snap.set_volume(volume);
                }
            }
            None => snap.disconnect(),
        }
        snap
    }

    pub fn link(&self) -> LinkState {
        self.link
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    /// Last known volume, retained across disconnects. `None` until the
    /// device has reported one.
    pub fn volume_percent(&self) -> Option<u8> {
        self.volume_percent
    }

    /// Volume to display: `None` unless connected with a known reading.
    pub fn current_volume(&self) -> Option<u8> {
        self.volume_percent.filter(|_| self.connected)
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn sink_id(&self) -> Option<&str> {
        self.sink_id.as_deref()
    }

    pub(crate) fn connect(&mut self, device_name: String) {
        self.link = LinkState::Connected;
        self.connected = true;
        self.device_name = Some(device_name);
    }

    /// Drops to `Disconnected`, keeping the last volume.
    pub(crate) fn disconnect(&mut self) {
        self.link = LinkState::Disconnected;
        self.connected = false;
        self.device_name = None;
        self.sink_id = None;
    }

    pub(crate) fn set_volume(&mut self, percent: u8) {
        self.restore_volume(Some(percent));
    }

    /// Puts back an earlier reading, including "unknown".
    pub(crate) fn restore_volume(&mut self, percent: Option<u8>) {
        self.volume_percent = percent.map(|p| p.min(100));
        self.muted = self.volume_percent == Some(0);
    }

    pub(crate) fn set_sink(&mut self, sink_id: Option<String>) {
        if self.connected {
            self.sink_id = sink_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use hscompanion_parser::parse_status;

    use super::*;

    #[test]
    fn from_report_connected() {
        let report = parse_status("device=H878 card=3\nPCM Volume (2 canais): 42%");
        let snap = DeviceSnapshot::from_report(Some(&report));
        assert_eq!(snap.link(), LinkState::Connected);
        assert_eq!(snap.device_name(), Some("H878"));
        assert_eq!(snap.current_volume(), Some(42));
        assert!(!snap.is_muted());
        assert_eq!(snap.sink_id(), None);
    }

    #[test]
    fn from_report_failed_or_absent() {
        let snap = DeviceSnapshot::from_report(None);
        assert_eq!(snap.link(), LinkState::Disconnected);

        let report = parse_status("nothing here");
        let snap = DeviceSnapshot::from_report(Some(&report));
        assert_eq!(snap.link(), LinkState::Disconnected);
        assert_eq!(snap.volume_percent(), None);
        assert!(!snap.is_muted());
    }

    #[test]
    fn from_report_without_volume_line() {
        let report = parse_status("device=H878 card=3\n");
        let snap = DeviceSnapshot::from_report(Some(&report));
        assert!(snap.is_connected());
        assert_eq!(snap.volume_percent(), None);
        assert_eq!(snap.current_volume(), None);
        assert!(!snap.is_muted());
    }

    #[test]
    fn default_is_unknown() {
        let snap = DeviceSnapshot::default();
        assert_eq!(snap.link(), LinkState::Unknown);
        assert!(!snap.is_connected());
        assert_eq!(snap.device_name(), None);
        assert_eq!(snap.current_volume(), None);
        assert_eq!(snap.volume_percent(), None);
        assert!(!snap.is_muted());
    }

    #[test]
    fn muted_tracks_zero_volume() {
        let mut snap = DeviceSnapshot::default();
        snap.connect("H878".into());
        snap.set_volume(0);
        assert!(snap.is_muted());
        snap.set_volume(12);
        assert!(!snap.is_muted());
        snap.set_volume(250);
        assert_eq!(snap.volume_percent(), Some(100));
        snap.restore_volume(None);
        assert!(!snap.is_muted());
    }

    #[test]
    fn disconnect_clears_name_and_sink_keeps_volume() {
        let mut snap = DeviceSnapshot::default();
        snap.connect("H878 Wireless headset".into());
        snap.set_volume(80);
        snap.set_sink(Some("alsa_output.usb-XiiSound".into()));

        snap.disconnect();
        assert_eq!(snap.link(), LinkState::Disconnected);
        assert_eq!(snap.device_name(), None);
        assert_eq!(snap.sink_id(), None);
        assert_eq!(snap.volume_percent(), Some(80));
        assert_eq!(snap.current_volume(), None);
    }

    #[test]
    fn sink_ignored_while_disconnected() {
        let mut snap = DeviceSnapshot::default();
        snap.set_sink(Some("alsa_output.usb-XiiSound".into()));
        assert_eq!(snap.sink_id(), None);
    }

    #[test]
    fn serializes_snake_case() {
        let mut snap = DeviceSnapshot::default();
        snap.connect("H878".into());
        snap.set_volume(0);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["link"], "connected");
        assert_eq!(json["connected"], true);
        assert_eq!(json["device_name"], "H878");
        assert_eq!(json["muted"], true);
        assert!(json["sink_id"].is_null());
    }
}
