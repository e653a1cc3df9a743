//! Parser for the control script's `status` output.
//!
//! Two output shapes are understood. The human-readable report:
//!
//! ```text
//! device=H878 Wireless headset card=3
//! PCM Volume (2 canais): 80%
//! PCM Volume [1] (1 canal): 80%
//! ```
//!
//! and the control daemon's compact reply:
//!
//! ```text
//! OK: device=Redragon card=3 pcm0=80 pcm1=75 analog=False
//! ```

use std::sync::LazyLock;

use regex::Regex;

/// `device=<name> card=<id>`; the name may contain spaces but not newlines.
static DEVICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"device=(.+?)[ \t]+card=(\S*)").expect("valid device regex"));

/// Current label of the primary channel.
static VOLUME_CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"PCM Volume \(2 (?:canais|channels)\):\s*(\d+)%").expect("valid volume regex")
});

/// Older label: any `PCM Volume...:` that is not the `[1]` channel.
static VOLUME_ALTERNATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PCM Volume[^:\[\n]*:\s*(\d+)%").expect("valid volume regex"));

static VOLUME_SECONDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"PCM Volume \[1\][^:\n]*:\s*(\d+)%").expect("valid volume regex")
});

static PCM0: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpcm0=(\d+)").expect("valid pcm regex"));

static PCM1: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpcm1=(\d+)").expect("valid pcm regex"));

static ANALOG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\banalog=(\w+)").expect("valid analog regex"));

/// Fields recovered from one status report. Unmatched fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    /// Human-readable device label; `None` means the headset is absent.
    pub device_name: Option<String>,
    /// Sound card index as printed by the tool.
    pub card: Option<String>,
    /// Effective volume, 0..=100.
    pub volume_percent: Option<u8>,
    /// The second PCM control, when the tool reports it.
    pub secondary_percent: Option<u8>,
}

impl StatusReport {
    pub fn is_connected(&self) -> bool {
        self.device_name.is_some()
    }

    /// Whether both PCM controls agree. `None` unless both were reported.
    pub fn channels_in_sync(&self) -> Option<bool> {
        match (self.volume_percent, self.secondary_percent) {
            (Some(a), Some(b)) => Some(a == b),
            _ => None,
        }
    }
}

/// Parses the output of the control script's `status` subcommand.
pub fn parse_status(output: &str) -> StatusReport {
    let mut report = StatusReport::default();

    if let Some(caps) = DEVICE.captures(output) {
        let name = caps[1].trim();
        if !name.is_empty() {
            report.device_name = Some(name.to_string());
            report.card = Some(caps[2].to_string()).filter(|c| !c.is_empty());
        }
    }

    if let Some(volume) = labelled_volume(output) {
        report.volume_percent = Some(volume);
        report.secondary_percent = capture_percent(&VOLUME_SECONDARY, output);
    } else {
        let pcm0 = capture_percent(&PCM0, output);
        let pcm1 = capture_percent(&PCM1, output);
        let analog = ANALOG
            .captures(output)
            .is_some_and(|c| c[1].eq_ignore_ascii_case("true"));
        // Analog output is driven by the second control.
        let (primary, secondary) = if analog { (pcm1, pcm0) } else { (pcm0, pcm1) };
        report.volume_percent = primary;
        report.secondary_percent = secondary;
    }

    report
}

fn labelled_volume(output: &str) -> Option<u8> {
    capture_percent(&VOLUME_CANONICAL, output).or_else(|| capture_percent(&VOLUME_ALTERNATE, output))
}

fn capture_percent(re: &Regex, output: &str) -> Option<u8> {
    let caps = re.captures(output)?;
    let value: u32 = caps[1].parse().ok()?;
    if value > 100 {
        tracing::debug!(value, "clamping volume above 100%");
    }
    Some(value.min(100) as u8)
}
