//! Application orchestrator: wires the engine to the tray, the notifier and
//! the optional stdio adapter.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use hscompanion_command::{CommandRunner, Notifier, ProcessRunner};
use hscompanion_engine::{DeviceSnapshot, EngineEvent, NOTICE_TITLE, SyncEngine, VolumeInput};
use hscompanion_parser::parse_status;
use hscompanion_tray::{TrayConfig, TrayEvent, TrayHandle};
use tokio::sync::broadcast::error::RecvError;

use crate::config::Config;
use crate::stdio;

/// How often tray gestures are drained.
const TRAY_POLL: Duration = Duration::from_millis(100);

/// Runs the indicator until shutdown is requested.
pub async fn run(config: Config, stdio_mode: bool) -> anyhow::Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());

    // -- Engine --
    let engine = SyncEngine::new(config.to_engine_config()?, Arc::clone(&runner));

    // -- Notifications --
    let notifier = if config.notifications {
        Notifier::new(Arc::clone(&runner), config.notify_spec()?)
    } else {
        Notifier::disabled(Arc::clone(&runner))
    };

    // -- Tray --
    let tray_config = TrayConfig {
        volume_step: config.volume_step,
    };
    let (tray_handle, _event_tx, _update_rx) = TrayHandle::new(tray_config);
    let mut bridge = TrayBridge {
        tray: tray_handle,
        notifier,
    };

    engine.start().await?;
    let snapshot = engine.snapshot();
    tracing::info!(
        connected = snapshot.is_connected(),
        device = snapshot.device_name().unwrap_or("-"),
        volume = ?snapshot.volume_percent(),
        "indicator ready"
    );

    // -- Main loop: wait for shutdown --
    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
            Ok(())
        }
        res = bridge.run(&engine) => {
            tracing::info!("quit requested via tray");
            res
        }
        res = stdio::serve(&engine), if stdio_mode => {
            tracing::info!("stdio adapter finished");
            res
        }
    };

    // -- Graceful shutdown --
    tracing::info!("stopping engine...");
    engine.stop().await;
    bridge.tray.shutdown();

    result
}

/// Forwards a user gesture to the engine.
///
/// Returns `Break` when the gesture asks the indicator to quit.
pub fn dispatch(engine: &SyncEngine, event: TrayEvent) -> anyhow::Result<ControlFlow<()>> {
    tracing::debug!(?event, "user intent");
    match event {
        TrayEvent::VolumeSet(percent) => engine.request_volume(percent)?,
        TrayEvent::VolumeEntered(percent) => {
            engine.request_volume_from(percent, VolumeInput::Step)?
        }
        TrayEvent::VolumeStep(delta) => engine.request_volume_step(delta)?,
        TrayEvent::MuteToggled => engine.request_mute_toggle()?,
        TrayEvent::SetDefaultOutput => engine.request_set_default_sink()?,
        TrayEvent::ResyncRequested => engine.request_manual_resync()?,
        TrayEvent::QuitRequested => return Ok(ControlFlow::Break(())),
    }
    Ok(ControlFlow::Continue(()))
}

/// Detects the headset once without starting the engine.
pub fn detect_once(config: &Config) -> anyhow::Result<DeviceSnapshot> {
    let engine_config = config.to_engine_config()?;
    let output = ProcessRunner::new().run_sync(&engine_config.status);
    let report = output.success.then(|| parse_status(&output.stdout));
    Ok(DeviceSnapshot::from_report(report.as_ref()))
}

fn default_output_message(device_name: Option<&str>) -> String {
    format!("{} set as default output", device_name.unwrap_or("Headset"))
}

/// Mirrors engine events into the tray and the desktop notifier, and feeds
/// tray gestures back to the engine.
struct TrayBridge {
    tray: TrayHandle,
    notifier: Notifier,
}

impl TrayBridge {
    /// Runs until the tray asks to quit.
    async fn run(&mut self, engine: &SyncEngine) -> anyhow::Result<()> {
        let mut events = engine.subscribe();
        let mut poll = tokio::time::interval(TRAY_POLL);
        self.tray.update_snapshot(&engine.snapshot());

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => self.on_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "tray bridge lagged behind engine events");
                        self.tray.update_snapshot(&engine.snapshot());
                    }
                    Err(RecvError::Closed) => return Ok(()),
                },
                _ = poll.tick() => {
                    while let Some(event) = self.tray.try_recv_event() {
                        if let ControlFlow::Break(()) = dispatch(engine, event)? {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    fn on_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::SnapshotChanged(snapshot) => {
                self.tray.update_snapshot(&snapshot);
            }
            EngineEvent::Notice(notice) => {
                self.tray.show_notice(&notice.title, &notice.message);
                self.notifier.notify(notice.title, notice.message);
            }
            EngineEvent::DefaultOutputSet { sink, device_name } => {
                tracing::info!(sink = %sink, "headset set as default output");
                let message = default_output_message(device_name.as_deref());
                self.tray.show_notice(NOTICE_TITLE, &message);
                self.notifier.notify(NOTICE_TITLE, message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use hscompanion_engine::{EngineConfig, LinkState, Notice};
    use hscompanion_tray::TrayUpdate;

    use super::*;

    fn bridge() -> (TrayBridge, std::sync::mpsc::Receiver<TrayUpdate>) {
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());
        let (tray, _event_tx, update_rx) = TrayHandle::new(TrayConfig::default());
        let bridge = TrayBridge {
            tray,
            notifier: Notifier::disabled(runner),
        };
        (bridge, update_rx)
    }

    #[test]
    fn default_output_message_names_device() {
        assert_eq!(
            default_output_message(Some("H878 Wireless headset")),
            "H878 Wireless headset set as default output"
        );
        assert_eq!(default_output_message(None), "Headset set as default output");
    }

    #[test]
    fn notices_reach_the_tray() {
        let (mut bridge, updates) = bridge();
        bridge.on_event(EngineEvent::Notice(Notice::info("Volume updated")));
        bridge.on_event(EngineEvent::DefaultOutputSet {
            sink: "alsa_output.usb-XiiSound".into(),
            device_name: None,
        });

        let messages: Vec<String> = updates
            .try_iter()
            .filter_map(|u| match u {
                TrayUpdate::Notice { message, .. } => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(
            messages,
            vec!["Volume updated", "Headset set as default output"]
        );
    }

    #[test]
    fn dispatch_requires_running_engine() {
        let engine = SyncEngine::new(
            EngineConfig::default(),
            Arc::new(ProcessRunner::new()),
        );
        assert!(dispatch(&engine, TrayEvent::VolumeSet(10)).is_err());
        assert!(dispatch(&engine, TrayEvent::VolumeEntered(10)).is_err());
        assert!(matches!(
            dispatch(&engine, TrayEvent::QuitRequested),
            Ok(ControlFlow::Break(()))
        ));
    }

    #[test]
    fn detect_once_with_missing_script_is_disconnected() {
        let config = Config {
            control_script: "/nonexistent/hscompanion-volume".into(),
            ..Config::default()
        };
        let snapshot = detect_once(&config).unwrap();
        assert_eq!(snapshot.link(), LinkState::Disconnected);
    }
}
