//! Line-oriented adapter for shell panel applets.
//!
//! Every snapshot change is written to stdout as one JSON object per line.
//! Each stdin line is one intent:
//!
//! ```text
//! volume <0-100>
//! step <+n|-n>
//! mute
//! default
//! resync
//! quit
//! ```

use std::io::BufRead;
use std::ops::ControlFlow;

use hscompanion_engine::{DeviceSnapshot, EngineEvent, SyncEngine};
use hscompanion_tray::TrayEvent;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use crate::app;

/// Parses one stdin line into the intent it names.
///
/// Returns `None` for blank or unrecognized lines.
pub fn parse_line(line: &str) -> Option<TrayEvent> {
    let mut words = line.split_whitespace();
    let command = words.next()?;
    let arg = words.next();
    if words.next().is_some() {
        return None;
    }

    match (command, arg) {
        ("volume", Some(n)) => {
            let percent: u16 = n.trim_end_matches('%').parse().ok()?;
            Some(TrayEvent::VolumeEntered(percent.min(100) as u8))
        }
        ("step", Some(n)) => n.parse().ok().map(TrayEvent::VolumeStep),
        ("mute", None) => Some(TrayEvent::MuteToggled),
        ("default", None) => Some(TrayEvent::SetDefaultOutput),
        ("resync", None) => Some(TrayEvent::ResyncRequested),
        ("quit", None) => Some(TrayEvent::QuitRequested),
        _ => None,
    }
}

async fn write_snapshot<W>(out: &mut W, snapshot: &DeviceSnapshot) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(snapshot)?;
    line.push('\n');
    out.write_all(line.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

/// Reads lines on a dedicated thread and forwards them to the returned
/// channel.
///
/// A blocked read must not keep the runtime alive on shutdown, so the thread
/// is detached and only ends at end of input, on a read error, or once the
/// receiver is gone.
fn spawn_line_reader<R>(input: R) -> std::io::Result<mpsc::Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in input.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!("stdin read failed: {e}");
                        break;
                    }
                };
                if tx.blocking_send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Serves stdin/stdout until `quit` or end of input.
pub async fn serve(engine: &SyncEngine) -> anyhow::Result<()> {
    let lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()))?;
    serve_lines(engine, lines, tokio::io::stdout()).await
}

async fn serve_lines<W>(
    engine: &SyncEngine,
    mut lines: mpsc::Receiver<String>,
    mut out: W,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut events = engine.subscribe();

    write_snapshot(&mut out, &engine.snapshot()).await?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(EngineEvent::SnapshotChanged(snapshot)) => {
                    write_snapshot(&mut out, &snapshot).await?;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "stdio adapter lagged, writing latest snapshot");
                    write_snapshot(&mut out, &engine.snapshot()).await?;
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            line = lines.recv() => {
                let Some(line) = line else {
                    tracing::info!("stdin closed");
                    return Ok(());
                };
                match parse_line(&line) {
                    Some(event) => {
                        if let ControlFlow::Break(()) = app::dispatch(engine, event)? {
                            return Ok(());
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => tracing::warn!(line = %line.trim(), "ignoring unknown command"),
                }
            }
        }
    }
}
