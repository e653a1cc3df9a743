//! Command runner trait and the process-backed implementation.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::process::{Output, Stdio};

use crate::CommandError;

/// A boxed future returned by [`CommandRunner::run`].
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = CommandOutput> + Send + 'a>>;

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Creates a spec for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Builds a spec from an argv-style list (`["pactl", "list", "sinks"]`).
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Result<Self, CommandError> {
        let (program, rest) = argv.split_first().ok_or(CommandError::Empty)?;
        if program.as_ref().trim().is_empty() {
            return Err(CommandError::Empty);
        }
        Ok(Self::new(program.as_ref()).args(rest.iter().map(AsRef::as_ref)))
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Raw result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `true` when the process started and exited with status 0.
    pub success: bool,
    /// Captured standard output (lossy UTF-8). Empty if the process never ran.
    pub stdout: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
        }
    }

    pub fn failed() -> Self {
        Self::default()
    }
}

/// Runs external commands.
///
/// Implementations must not panic or hang the caller on failure: a missing
/// executable or a non-zero exit is reported through
/// [`CommandOutput::success`].
pub trait CommandRunner: Send + Sync + 'static {
    /// Runs `spec` to completion and captures its stdout.
    fn run<'a>(&'a self, spec: &'a CommandSpec) -> RunFuture<'a>;
}

/// [`CommandRunner`] backed by real child processes.
///
/// Children are spawned with `kill_on_drop`, so aborting the task that awaits
/// a command also terminates the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }

    /// Runs `spec` on the calling thread.
    ///
    /// Only meant for one-shot detection before any event loop exists; the
    /// call is bounded by the external tool's own behaviour.
    pub fn run_sync(&self, spec: &CommandSpec) -> CommandOutput {
        let result = std::process::Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::Spawn {
                program: spec.program.clone(),
                source,
            });

        finish(spec, result)
    }
}

impl CommandRunner for ProcessRunner {
    fn run<'a>(&'a self, spec: &'a CommandSpec) -> RunFuture<'a> {
        Box::pin(async move { finish(spec, spawn_output(spec).await) })
    }
}

async fn spawn_output(spec: &CommandSpec) -> Result<Output, CommandError> {
    tokio::process::Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CommandError::Spawn {
            program: spec.program.clone(),
            source,
        })
}

/// Converts a process result into a [`CommandOutput`], logging failures.
///
/// A non-zero exit keeps whatever stdout the process produced.
fn finish(spec: &CommandSpec, result: Result<Output, CommandError>) -> CommandOutput {
    let output = match result {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(command = %spec, "{e}");
            return CommandOutput::failed();
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if output.status.success() {
        tracing::trace!(command = %spec, bytes = stdout.len(), "command finished");
        return CommandOutput::ok(stdout);
    }

    let error = exit_error(spec, &output);
    tracing::warn!(command = %spec, "{error}");
    CommandOutput {
        success: false,
        stdout,
    }
}

fn exit_error(spec: &CommandSpec, output: &Output) -> CommandError {
    CommandError::Exit {
        program: spec.program.clone(),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_from_argv() {
        let spec = CommandSpec::from_argv(&["pactl", "list", "sinks", "short"]).unwrap();
        assert_eq!(spec.program, "pactl");
        assert_eq!(spec.args, vec!["list", "sinks", "short"]);
        assert_eq!(spec.to_string(), "pactl list sinks short");
    }

    #[test]
    fn spec_from_empty_argv() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            CommandSpec::from_argv(&empty),
            Err(CommandError::Empty)
        ));
        assert!(matches!(
            CommandSpec::from_argv(&["  "]),
            Err(CommandError::Empty)
        ));
    }

    #[test]
    fn spec_builder_appends() {
        let spec = CommandSpec::new("notify-send")
            .arg("Title")
            .args(["body", "--urgency=low"]);
        assert_eq!(spec.args, vec!["Title", "body", "--urgency=low"]);
    }

    #[tokio::test]
    async fn missing_program_reports_failure() {
        let spec = CommandSpec::new("hscompanion-definitely-not-installed");
        let out = ProcessRunner::new().run(&spec).await;
        assert!(!out.success);
        assert!(out.stdout.is_empty());
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let spec = CommandSpec::new("hscompanion-definitely-not-installed");
        let err = spawn_output(&spec).await.unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
        assert!(err.to_string().starts_with("failed to spawn hscompanion-definitely-not-installed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout() {
        let spec = CommandSpec::new("sh").args(["-c", "echo 'device=H878 card=3'"]);
        let out = ProcessRunner::new().run(&spec).await;
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "device=H878 card=3");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_keeps_stdout() {
        let spec = CommandSpec::new("sh").args(["-c", "echo partial; exit 3"]);
        let out = ProcessRunner::new().run(&spec).await;
        assert!(!out.success);
        assert_eq!(out.stdout.trim(), "partial");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_error_carries_stderr() {
        let spec = CommandSpec::new("sh").args(["-c", "echo 'no headset' >&2; exit 2"]);
        let output = spawn_output(&spec).await.unwrap();
        match exit_error(&spec, &output) {
            CommandError::Exit { program, stderr, .. } => {
                assert_eq!(program, "sh");
                assert_eq!(stderr, "no headset");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn run_sync_captures_stdout() {
        let spec = CommandSpec::new("sh").args(["-c", "printf 'PCM Volume: 42%%'"]);
        let out = ProcessRunner::new().run_sync(&spec);
        assert!(out.success);
        assert_eq!(out.stdout, "PCM Volume: 42%");
    }

    #[test]
    fn run_sync_missing_program() {
        let spec = CommandSpec::new("hscompanion-definitely-not-installed");
        assert_eq!(ProcessRunner::new().run_sync(&spec), CommandOutput::failed());
    }
}
