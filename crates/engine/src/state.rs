//! Engine state and its transitions.
//!
//! Nothing here performs I/O or reads the clock: callers pass `now` and act on
//! the returned outcomes. The event loop in [`crate::engine`] is the only
//! owner of an [`EngineState`].

use std::time::Duration;

use hscompanion_parser::StatusReport;
use tokio::time::Instant;

use crate::snapshot::{DeviceSnapshot, LinkState};

/// Kind of gesture a volume intent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeInput {
    /// Continuous drag; only the settled value should reach the device.
    Slider,
    /// Discrete press or scroll notch.
    Step,
}

/// A UI-originated volume target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeIntent {
    pub percent: u8,
    /// Monotonic per engine lifecycle.
    pub seq: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingWrite {
    intent: VolumeIntent,
    due: Instant,
}

/// Identifies one poll and what the engine looked like when it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PollTicket {
    seq: u64,
    intent_seq: u64,
    /// No write was pending or running at launch.
    clean: bool,
}

/// What the loop has to do after a poll result was applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PollOutcome {
    pub changed: bool,
    /// Resolve the sink for this connection epoch.
    pub resolve_sink: Option<u64>,
    /// The device reported diverging PCM controls.
    pub drifted: bool,
    /// A manual resync finished; carries the resulting link state.
    pub resync_done: Option<bool>,
}

/// Mutable state owned by one running engine.
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    snapshot: DeviceSnapshot,
    pending: Option<PendingWrite>,
    write_in_flight: bool,
    /// Last volume read back from the device.
    confirmed_volume: Option<u8>,
    last_intent_seq: u64,
    last_poll_seq: u64,
    applied_poll_seq: u64,
    connect_epoch: u64,
    resync_at: Option<Instant>,
    resync_notice_after: Option<u64>,
    channel_sync_in_flight: bool,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &DeviceSnapshot {
        &self.snapshot
    }

    pub fn is_connected(&self) -> bool {
        self.snapshot.is_connected()
    }

    pub fn begin_poll(&mut self) -> PollTicket {
        self.last_poll_seq += 1;
        PollTicket {
            seq: self.last_poll_seq,
            intent_seq: self.last_intent_seq,
            clean: self.pending.is_none() && !self.write_in_flight,
        }
    }

    /// Starts a poll whose completion should produce a user notice.
    ///
    /// A request made while an earlier one is still running takes over its
    /// notice, so the user hears about the newest reading.
    pub fn begin_manual_resync(&mut self) -> PollTicket {
        let ticket = self.begin_poll();
        self.resync_notice_after = Some(ticket.seq);
        ticket
    }

    /// Applies a poll result. `None` means the status command failed.
    pub fn apply_poll(&mut self, ticket: PollTicket, report: Option<StatusReport>) -> PollOutcome {
        if ticket.seq <= self.applied_poll_seq {
            tracing::trace!(seq = ticket.seq, "dropping out-of-order poll result");
            return PollOutcome::default();
        }
        self.applied_poll_seq = ticket.seq;

        let before = self.snapshot.clone();
        let mut outcome = PollOutcome::default();

        match report {
            Some(StatusReport {
                device_name: Some(name),
                volume_percent,
                secondary_percent,
                ..
            }) => {
                if self.snapshot.link() != LinkState::Connected {
                    self.connect_epoch += 1;
                    outcome.resolve_sink = Some(self.connect_epoch);
                    tracing::info!(device = %name, "headset connected");
                }
                self.snapshot.connect(name);

                // A poll that raced a local intent would undo the optimistic update.
                let fresh = ticket.clean && ticket.intent_seq == self.last_intent_seq;
                if let Some(volume) = volume_percent {
                    self.confirmed_volume = Some(volume);
                    if fresh {
                        self.snapshot.set_volume(volume);
                    }
                }

                outcome.drifted = matches!(
                    (volume_percent, secondary_percent),
                    (Some(a), Some(b)) if a != b
                );
            }
            _ => {
                if self.snapshot.link() == LinkState::Connected {
                    tracing::info!("headset disconnected");
                }
                // An unsent write has no device left to reach.
                if let Some(dropped) = self.pending.take() {
                    tracing::debug!(percent = dropped.intent.percent, "dropping unsent volume write");
                    self.snapshot.restore_volume(self.confirmed_volume);
                }
                self.snapshot.disconnect();
            }
        }

        outcome.changed = self.snapshot != before;

        if self
            .resync_notice_after
            .is_some_and(|seq| ticket.seq >= seq)
        {
            self.resync_notice_after = None;
            outcome.resync_done = Some(self.snapshot.is_connected());
        }

        outcome
    }

    /// Stores a resolved sink. Ignored when the connection it was resolved
    /// for is gone. Returns whether the snapshot changed.
    pub fn apply_sink(&mut self, epoch: u64, sink_id: Option<String>) -> bool {
        if epoch != self.connect_epoch || !self.snapshot.is_connected() {
            return false;
        }
        let before = self.snapshot.sink_id().map(str::to_string);
        self.snapshot.set_sink(sink_id);
        before.as_deref() != self.snapshot.sink_id()
    }

    /// Target for a relative step from the current volume.
    pub fn step_target(&self, delta: i8) -> u8 {
        let base = self.snapshot.volume_percent().unwrap_or(0);
        (i16::from(base) + i16::from(delta)).clamp(0, 100) as u8
    }

    /// Records a volume intent, updating the snapshot immediately.
    ///
    /// Any pending write is superseded and the window restarts at `now`.
    /// Returns `None` while disconnected.
    pub fn request_volume(
        &mut self,
        percent: u8,
        window: Duration,
        now: Instant,
    ) -> Option<VolumeIntent> {
        if !self.snapshot.is_connected() {
            return None;
        }

        self.last_intent_seq += 1;
        let intent = VolumeIntent {
            percent: percent.min(100),
            seq: self.last_intent_seq,
        };

        if let Some(old) = self.pending.replace(PendingWrite {
            intent,
            due: now + window,
        }) {
            tracing::debug!(
                superseded = old.intent.percent,
                percent = intent.percent,
                "volume intent superseded"
            );
        }

        self.snapshot.set_volume(intent.percent);
        Some(intent)
    }

    /// When the pending write may be sent. `None` while a write is running.
    pub fn write_due(&self) -> Option<Instant> {
        if self.write_in_flight {
            return None;
        }
        self.pending.map(|p| p.due)
    }

    /// Takes the pending write if its window has closed.
    pub fn take_due_write(&mut self, now: Instant) -> Option<VolumeIntent> {
        if !self.snapshot.is_connected() {
            self.pending = None;
            return None;
        }
        if self.write_in_flight {
            return None;
        }
        match self.pending {
            Some(p) if p.due <= now => {
                self.pending = None;
                self.write_in_flight = true;
                Some(p.intent)
            }
            _ => None,
        }
    }

    pub fn finish_write(&mut self) {
        self.write_in_flight = false;
    }

    pub fn schedule_resync(&mut self, at: Instant) {
        self.resync_at = Some(at);
    }

    pub fn resync_due(&self) -> Option<Instant> {
        self.resync_at
    }

    /// Clears a settle-delay resync whose time has come.
    pub fn take_resync(&mut self, now: Instant) -> bool {
        match self.resync_at {
            Some(at) if at <= now => {
                self.resync_at = None;
                true
            }
            _ => false,
        }
    }

    /// Returns `false` if a channel sync is already running.
    pub fn begin_channel_sync(&mut self) -> bool {
        !std::mem::replace(&mut self.channel_sync_in_flight, true)
    }

    pub fn finish_channel_sync(&mut self) {
        self.channel_sync_in_flight = false;
    }

    /// Clears in-flight markers after a command task died without reporting.
    pub fn clear_in_flight(&mut self) {
        self.write_in_flight = false;
        self.channel_sync_in_flight = false;
    }
}
