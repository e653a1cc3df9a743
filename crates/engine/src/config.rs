//! Engine configuration.

use std::time::Duration;

use hscompanion_command::CommandSpec;
use hscompanion_parser::DEFAULT_SINK_FRAGMENTS;

/// Shortest accepted poll cadence.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Longest accepted poll cadence.
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Commands and timings used by the sync engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Reads device state (`<script> status`).
    pub status: CommandSpec,
    /// Sets the volume; the target percentage is appended.
    pub set_volume: CommandSpec,
    /// Toggles mute.
    pub mute: CommandSpec,
    /// Copies the primary PCM control onto the secondary one.
    pub sync: CommandSpec,
    /// Lists audio server sinks, one per line.
    pub list_sinks: CommandSpec,
    /// Selects the default sink; the sink id is appended.
    pub set_default_sink: CommandSpec,
    /// Substrings identifying the headset's sink.
    pub sink_fragments: Vec<String>,
    pub poll_interval: Duration,
    /// Debounce for continuous input (slider drags).
    pub slider_debounce: Duration,
    /// Debounce for discrete input (scroll steps, +/- buttons).
    pub step_debounce: Duration,
    /// Wait after a mute toggle before re-reading the device.
    pub mute_settle: Duration,
    /// Run the `sync` subcommand when the two PCM controls drift apart.
    pub auto_sync: bool,
}

impl EngineConfig {
    /// Builds a configuration around a control script path.
    pub fn with_script(script: impl Into<String>) -> Self {
        let script = script.into();
        Self {
            status: CommandSpec::new(&script).arg("status"),
            set_volume: CommandSpec::new(&script),
            mute: CommandSpec::new(&script).arg("mute"),
            sync: CommandSpec::new(&script).arg("sync"),
            list_sinks: CommandSpec::new("pactl").args(["list", "sinks", "short"]),
            set_default_sink: CommandSpec::new("pactl").arg("set-default-sink"),
            sink_fragments: DEFAULT_SINK_FRAGMENTS.iter().map(|s| s.to_string()).collect(),
            poll_interval: Duration::from_secs(3),
            slider_debounce: Duration::from_millis(20),
            step_debounce: Duration::ZERO,
            mute_settle: Duration::from_millis(500),
            auto_sync: true,
        }
    }

    /// Poll cadence clamped to the supported range.
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::with_script("redragon-volume")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_commands() {
        let config = EngineConfig::default();
        assert_eq!(config.status.to_string(), "redragon-volume status");
        assert_eq!(config.mute.to_string(), "redragon-volume mute");
        assert_eq!(config.set_volume.to_string(), "redragon-volume");
        assert_eq!(config.list_sinks.to_string(), "pactl list sinks short");
        assert_eq!(config.sink_fragments, vec!["XiiSound", "Weltrend", "Redragon"]);
        assert!(config.auto_sync);
    }

    #[test]
    fn poll_interval_is_clamped() {
        let mut config = EngineConfig::default();
        config.poll_interval = Duration::from_millis(200);
        assert_eq!(config.effective_poll_interval(), MIN_POLL_INTERVAL);
        config.poll_interval = Duration::from_secs(60);
        assert_eq!(config.effective_poll_interval(), MAX_POLL_INTERVAL);
        config.poll_interval = Duration::from_secs(3);
        assert_eq!(config.effective_poll_interval(), Duration::from_secs(3));
    }
}
