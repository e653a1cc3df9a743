//! External command execution for the headset companion.
//!
//! Everything the companion knows about the headset and the audio server
//! comes from running external programs: the headset control script, the
//! audio server's CLI and the desktop notifier. This crate wraps those
//! invocations behind the [`CommandRunner`] trait so the sync engine can be
//! driven by a scripted runner in tests.
//!
//! Failures never propagate out of [`CommandRunner::run`]: they are logged
//! and reported as a failed [`CommandOutput`].

mod notify;
mod runner;

pub use notify::Notifier;
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner, RunFuture};

/// Errors produced while running an external command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("empty command line")]
    Empty,
}
