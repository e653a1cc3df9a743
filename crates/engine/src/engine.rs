//! The sync engine: one task that owns [`EngineState`] and multiplexes the
//! poll timer, the debounce timer, user intents and command completions.
//!
//! Commands run in a [`JoinSet`] owned by the loop, so their completions are
//! applied on the loop itself and never race each other. Stopping the engine
//! drops the set, which aborts every outstanding command.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hscompanion_command::{CommandOutput, CommandRunner, CommandSpec};
use hscompanion_parser::{parse_status, resolve_sink};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::EngineError;
use crate::config::EngineConfig;
use crate::events::{EngineEvent, Notice};
use crate::snapshot::DeviceSnapshot;
use crate::state::{EngineState, PollTicket, VolumeInput, VolumeIntent};

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 64;

/// Intents forwarded from presentation adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineCommand {
    SetVolume { percent: u8, input: VolumeInput },
    StepVolume(i8),
    ToggleMute,
    SetDefaultSink,
    Resync,
}

/// Results of commands spawned by the loop.
#[derive(Debug)]
enum Completion {
    Poll {
        ticket: PollTicket,
        output: CommandOutput,
    },
    Sink {
        epoch: u64,
        output: CommandOutput,
    },
    VolumeWrite {
        intent: VolumeIntent,
        output: CommandOutput,
    },
    Mute {
        output: CommandOutput,
    },
    DefaultSink {
        sink: String,
        output: CommandOutput,
    },
    ChannelSync {
        output: CommandOutput,
    },
}

struct Running {
    cancel: CancellationToken,
    commands: mpsc::UnboundedSender<EngineCommand>,
    task: JoinHandle<()>,
}

/// Keeps the headset and the presentation layer in sync.
///
/// Create one per indicator, [`start`](Self::start) it, and
/// [`stop`](Self::stop) it on teardown. Adapters observe it through
/// [`subscribe`](Self::subscribe) or [`watch_snapshot`](Self::watch_snapshot)
/// and feed user gestures through the `request_*` methods.
pub struct SyncEngine {
    config: Arc<EngineConfig>,
    runner: Arc<dyn CommandRunner>,
    events_tx: broadcast::Sender<EngineEvent>,
    snapshot_tx: watch::Sender<DeviceSnapshot>,
    running: Mutex<Option<Running>>,
}

impl SyncEngine {
    pub fn new(config: EngineConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot_tx, _) = watch::channel(DeviceSnapshot::default());
        Self {
            config: Arc::new(config),
            runner,
            events_tx,
            snapshot_tx,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Subscribes to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    /// Watches the latest snapshot.
    pub fn watch_snapshot(&self) -> watch::Receiver<DeviceSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Starts the engine.
    ///
    /// Returns once the initial detection has completed, so the published
    /// snapshot has already left [`LinkState::Unknown`](crate::LinkState).
    pub async fn start(&self) -> Result<(), EngineError> {
        let ready = {
            let mut guard = self.running.lock().map_err(|_| EngineError::Poisoned)?;
            if guard.is_some() {
                return Err(EngineError::AlreadyRunning);
            }

            let cancel = CancellationToken::new();
            let (commands_tx, commands_rx) = mpsc::unbounded_channel();
            let (ready_tx, ready_rx) = oneshot::channel();

            let engine_loop = EngineLoop {
                config: Arc::clone(&self.config),
                runner: Arc::clone(&self.runner),
                state: EngineState::new(),
                events_tx: self.events_tx.clone(),
                snapshot_tx: self.snapshot_tx.clone(),
                tasks: JoinSet::new(),
            };
            let task = tokio::spawn(engine_loop.run(cancel.clone(), commands_rx, ready_tx));

            *guard = Some(Running {
                cancel,
                commands: commands_tx,
                task,
            });
            ready_rx
        };

        // The sender is dropped without a value only if the loop was cancelled
        // during detection, which is not an error for the caller.
        let _ = ready.await;
        tracing::info!(
            interval_ms = self.config.effective_poll_interval().as_millis() as u64,
            "sync engine started"
        );
        Ok(())
    }

    /// Stops the engine, cancelling timers and outstanding commands, and
    /// resets the published snapshot.
    pub async fn stop(&self) {
        let running = match self.running.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(running) = running else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.task.await {
            tracing::warn!("sync engine task ended abnormally: {e}");
        }
        self.snapshot_tx.send_replace(DeviceSnapshot::default());
        tracing::info!("sync engine stopped");
    }

    /// Slider-originated absolute volume (short debounce).
    pub fn request_volume(&self, percent: u8) -> Result<(), EngineError> {
        self.send(EngineCommand::SetVolume {
            percent,
            input: VolumeInput::Slider,
        })
    }

    /// Absolute volume with an explicit input kind.
    pub fn request_volume_from(&self, percent: u8, input: VolumeInput) -> Result<(), EngineError> {
        self.send(EngineCommand::SetVolume { percent, input })
    }

    /// Relative change from the current volume (discrete step).
    pub fn request_volume_step(&self, delta: i8) -> Result<(), EngineError> {
        self.send(EngineCommand::StepVolume(delta))
    }

    pub fn request_mute_toggle(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::ToggleMute)
    }

    /// Makes the headset the audio server's default output.
    pub fn request_set_default_sink(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::SetDefaultSink)
    }

    /// Polls immediately and reports the outcome as a notice.
    pub fn request_manual_resync(&self) -> Result<(), EngineError> {
        self.send(EngineCommand::Resync)
    }

    fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        let guard = self.running.lock().map_err(|_| EngineError::Poisoned)?;
        let running = guard.as_ref().ok_or(EngineError::NotRunning)?;
        running
            .commands
            .send(command)
            .map_err(|_| EngineError::NotRunning)
    }
}

struct EngineLoop {
    config: Arc<EngineConfig>,
    runner: Arc<dyn CommandRunner>,
    state: EngineState,
    events_tx: broadcast::Sender<EngineEvent>,
    snapshot_tx: watch::Sender<DeviceSnapshot>,
    tasks: JoinSet<Completion>,
}

impl EngineLoop {
    async fn run(
        mut self,
        cancel: CancellationToken,
        mut commands: mpsc::UnboundedReceiver<EngineCommand>,
        ready: oneshot::Sender<()>,
    ) {
        // Initial detection runs inline: nothing else is processed until the
        // first snapshot exists.
        let ticket = self.state.begin_poll();
        let output = tokio::select! {
            _ = cancel.cancelled() => return,
            output = self.runner.run(&self.config.status) => output,
        };
        self.on_poll(ticket, output);
        let _ = ready.send(());

        let mut ticker = tokio::time::interval(self.config.effective_poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the first immediate tick.
        ticker.tick().await;

        loop {
            let write_due = self.state.write_due();
            let resync_due = self.state.resync_due();

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.spawn_poll(),
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => match joined {
                    Ok(completion) => self.on_completion(completion),
                    Err(e) => {
                        tracing::warn!("command task failed: {e}");
                        self.state.clear_in_flight();
                    }
                },
                _ = sleep_until(write_due), if write_due.is_some() => self.flush_write(),
                _ = sleep_until(resync_due), if resync_due.is_some() => {
                    if self.state.take_resync(Instant::now()) {
                        self.spawn_poll();
                    }
                }
            }
        }

        self.tasks.shutdown().await;
        tracing::debug!("sync loop exited");
    }

    fn on_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::SetVolume { percent, input } => self.apply_intent(percent, input),
            EngineCommand::StepVolume(delta) => {
                let target = self.state.step_target(delta);
                self.apply_intent(target, VolumeInput::Step);
            }
            EngineCommand::ToggleMute => {
                if !self.require_connected() {
                    return;
                }
                let spec = self.config.mute.clone();
                self.spawn(spec, |output| Completion::Mute { output });
            }
            EngineCommand::SetDefaultSink => match self.state.snapshot().sink_id() {
                Some(sink) => {
                    let sink = sink.to_string();
                    let spec = self.config.set_default_sink.clone().arg(&sink);
                    self.spawn(spec, move |output| Completion::DefaultSink { sink, output });
                }
                None => {
                    tracing::info!("default output requested but no headset sink is known");
                    self.notice(Notice::error("Headset audio output not found"));
                }
            },
            EngineCommand::Resync => {
                let ticket = self.state.begin_manual_resync();
                self.spawn_poll_with(ticket);
            }
        }
    }

    fn apply_intent(&mut self, percent: u8, input: VolumeInput) {
        let window = match input {
            VolumeInput::Slider => self.config.slider_debounce,
            VolumeInput::Step => self.config.step_debounce,
        };
        match self.state.request_volume(percent, window, Instant::now()) {
            Some(intent) => {
                tracing::debug!(percent = intent.percent, seq = intent.seq, ?input, "volume intent");
                self.publish();
            }
            None => {
                self.notice(Notice::error("Headset not connected"));
            }
        }
    }

    fn require_connected(&mut self) -> bool {
        if self.state.is_connected() {
            return true;
        }
        self.notice(Notice::error("Headset not connected"));
        false
    }

    fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Poll { ticket, output } => self.on_poll(ticket, output),
            Completion::Sink { epoch, output } => {
                let sink = if output.success {
                    resolve_sink(&output.stdout, &self.config.sink_fragments)
                } else {
                    None
                };
                match &sink {
                    Some(sink) => tracing::info!(sink = %sink, "headset sink resolved"),
                    None => tracing::warn!("no headset sink registered; retrying on next reconnect"),
                }
                if self.state.apply_sink(epoch, sink) {
                    self.publish();
                }
            }
            Completion::VolumeWrite { intent, output } => {
                self.state.finish_write();
                if !output.success {
                    self.notice(Notice::error(format!(
                        "Could not set volume to {}%",
                        intent.percent
                    )));
                }
            }
            Completion::Mute { output } => {
                if !output.success {
                    self.notice(Notice::error("Could not toggle mute"));
                }
                self.state
                    .schedule_resync(Instant::now() + self.config.mute_settle);
            }
            Completion::DefaultSink { sink, output } => {
                if output.success {
                    let device_name = self.state.snapshot().device_name().map(str::to_string);
                    let _ = self
                        .events_tx
                        .send(EngineEvent::DefaultOutputSet { sink, device_name });
                } else {
                    self.notice(Notice::error("Could not set the headset as default output"));
                }
            }
            Completion::ChannelSync { output } => {
                self.state.finish_channel_sync();
                if !output.success {
                    tracing::warn!("channel sync failed");
                }
            }
        }
    }

    fn on_poll(&mut self, ticket: PollTicket, output: CommandOutput) {
        // A failed status command counts as absence, never as stale presence.
        let report = output.success.then(|| parse_status(&output.stdout));
        let outcome = self.state.apply_poll(ticket, report);

        if outcome.changed {
            self.publish();
        }
        if let Some(epoch) = outcome.resolve_sink {
            let spec = self.config.list_sinks.clone();
            self.spawn(spec, move |output| Completion::Sink { epoch, output });
        }
        if outcome.drifted && self.config.auto_sync && self.state.begin_channel_sync() {
            tracing::info!("PCM controls drifted apart, syncing");
            let spec = self.config.sync.clone();
            self.spawn(spec, |output| Completion::ChannelSync { output });
        }
        match outcome.resync_done {
            Some(true) => self.notice(Notice::info("Volume updated")),
            Some(false) => self.notice(Notice::error("Headset not connected")),
            None => {}
        }
    }

    fn flush_write(&mut self) {
        let Some(intent) = self.state.take_due_write(Instant::now()) else {
            return;
        };
        tracing::debug!(percent = intent.percent, seq = intent.seq, "writing volume");
        let spec = self.config.set_volume.clone().arg(intent.percent.to_string());
        self.spawn(spec, move |output| Completion::VolumeWrite { intent, output });
    }

    fn spawn_poll(&mut self) {
        let ticket = self.state.begin_poll();
        self.spawn_poll_with(ticket);
    }

    fn spawn_poll_with(&mut self, ticket: PollTicket) {
        tracing::trace!("polling headset status");
        let spec = self.config.status.clone();
        self.spawn(spec, move |output| Completion::Poll { ticket, output });
    }

    fn spawn<F>(&mut self, spec: CommandSpec, complete: F)
    where
        F: FnOnce(CommandOutput) -> Completion + Send + 'static,
    {
        let runner = Arc::clone(&self.runner);
        self.tasks.spawn(async move {
            let output = runner.run(&spec).await;
            complete(output)
        });
    }

    fn publish(&self) {
        let snapshot = self.state.snapshot().clone();
        self.snapshot_tx.send_replace(snapshot.clone());
        let _ = self.events_tx.send(EngineEvent::SnapshotChanged(snapshot));
    }

    fn notice(&self, notice: Notice) {
        tracing::debug!(message = %notice.message, "notice");
        let _ = self.events_tx.send(EngineEvent::Notice(notice));
    }
}

/// Sleeps until `deadline`; far in the future when there is none (the
/// branch is disabled in that case anyway).
fn sleep_until(deadline: Option<Instant>) -> tokio::time::Sleep {
    let deadline = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));
    tokio::time::sleep_until(deadline)
}
