//! Indicator configuration.
//!
//! Stored as TOML at `$XDG_CONFIG_HOME/hscompanion/indicator.toml`
//! (`~/.config/hscompanion/indicator.toml` when the variable is unset).

use std::path::{Path, PathBuf};
use std::time::Duration;

use hscompanion_command::CommandSpec;
use hscompanion_engine::EngineConfig;
use hscompanion_parser::DEFAULT_SINK_FRAGMENTS;
use hscompanion_tray::DEFAULT_VOLUME_STEP;
use serde::{Deserialize, Serialize};

/// Indicator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Headset control script; `~` is expanded.
    #[serde(default = "default_control_script")]
    pub control_script: String,

    #[serde(default = "default_status_args")]
    pub status_args: Vec<String>,

    #[serde(default = "default_mute_args")]
    pub mute_args: Vec<String>,

    #[serde(default = "default_sync_args")]
    pub sync_args: Vec<String>,

    /// Lists audio server sinks.
    #[serde(default = "default_list_sinks")]
    pub list_sinks: Vec<String>,

    /// Selects the default sink; the sink id is appended.
    #[serde(default = "default_set_default_sink")]
    pub set_default_sink: Vec<String>,

    /// Desktop notifier; title and message are appended.
    #[serde(default = "default_notify_command")]
    pub notify_command: Vec<String>,

    /// Substrings identifying the headset's sink.
    #[serde(default = "default_sink_fragments")]
    pub sink_fragments: Vec<String>,

    /// Poll cadence in seconds (clamped to 2..=5).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_slider_debounce")]
    pub slider_debounce_ms: u64,

    #[serde(default)]
    pub step_debounce_ms: u64,

    /// Wait after a mute toggle before re-reading the device.
    #[serde(default = "default_mute_settle")]
    pub mute_settle_ms: u64,

    /// Percentage points per volume up/down step.
    #[serde(default = "default_volume_step")]
    pub volume_step: u8,

    /// Sync the two PCM controls when they drift apart.
    #[serde(default = "default_true")]
    pub auto_sync: bool,

    /// Show desktop notifications.
    #[serde(default = "default_true")]
    pub notifications: bool,
}

fn default_control_script() -> String {
    "~/.local/bin/redragon-volume".into()
}

fn default_status_args() -> Vec<String> {
    vec!["status".into()]
}

fn default_mute_args() -> Vec<String> {
    vec!["mute".into()]
}

fn default_sync_args() -> Vec<String> {
    vec!["sync".into()]
}

fn default_list_sinks() -> Vec<String> {
    ["pactl", "list", "sinks", "short"].map(String::from).to_vec()
}

fn default_set_default_sink() -> Vec<String> {
    ["pactl", "set-default-sink"].map(String::from).to_vec()
}

fn default_notify_command() -> Vec<String> {
    vec!["notify-send".into()]
}

fn default_sink_fragments() -> Vec<String> {
    DEFAULT_SINK_FRAGMENTS.iter().map(|s| s.to_string()).collect()
}

fn default_poll_interval() -> u64 {
    3
}

fn default_slider_debounce() -> u64 {
    20
}

fn default_mute_settle() -> u64 {
    500
}

fn default_volume_step() -> u8 {
    DEFAULT_VOLUME_STEP
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            control_script: default_control_script(),
            status_args: default_status_args(),
            mute_args: default_mute_args(),
            sync_args: default_sync_args(),
            list_sinks: default_list_sinks(),
            set_default_sink: default_set_default_sink(),
            notify_command: default_notify_command(),
            sink_fragments: default_sink_fragments(),
            poll_interval_secs: default_poll_interval(),
            slider_debounce_ms: default_slider_debounce(),
            step_debounce_ms: 0,
            mute_settle_ms: default_mute_settle(),
            volume_step: default_volume_step(),
            auto_sync: default_true(),
            notifications: default_true(),
        }
    }
}

impl Config {
    /// Loads configuration from `path` (or the default location), writing a
    /// default file first if none exists.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => config_path(),
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "configuration read");
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Control script path with `~` expanded.
    pub fn script_path(&self) -> String {
        expand_tilde(&self.control_script, std::env::var("HOME").ok().as_deref())
    }

    /// Builds the engine configuration.
    pub fn to_engine_config(&self) -> anyhow::Result<EngineConfig> {
        let script = self.script_path();
        let script_cmd = |args: &[String]| CommandSpec::new(&script).args(args.iter().cloned());

        Ok(EngineConfig {
            status: script_cmd(&self.status_args),
            set_volume: CommandSpec::new(&script),
            mute: script_cmd(&self.mute_args),
            sync: script_cmd(&self.sync_args),
            list_sinks: CommandSpec::from_argv(&self.list_sinks)?,
            set_default_sink: CommandSpec::from_argv(&self.set_default_sink)?,
            sink_fragments: self.sink_fragments.clone(),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            slider_debounce: Duration::from_millis(self.slider_debounce_ms),
            step_debounce: Duration::from_millis(self.step_debounce_ms),
            mute_settle: Duration::from_millis(self.mute_settle_ms),
            auto_sync: self.auto_sync,
        })
    }

    /// Base command of the desktop notifier.
    pub fn notify_spec(&self) -> anyhow::Result<CommandSpec> {
        Ok(CommandSpec::from_argv(&self.notify_command)?)
    }
}

fn expand_tilde(path: &str, home: Option<&str>) -> String {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => format!("{}/{rest}", home.trim_end_matches('/')),
        _ if path == "~" => home.unwrap_or(path).to_string(),
        _ => path.to_string(),
    }
}

/// Returns the configuration file path.
fn config_path() -> PathBuf {
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
            PathBuf::from(home).join(".config")
        }
    };
    base.join("hscompanion").join("indicator.toml")
}
