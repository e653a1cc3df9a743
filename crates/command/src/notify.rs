//! Desktop notification facility.

use std::sync::Arc;

use crate::runner::{CommandRunner, CommandSpec};

/// Fire-and-forget desktop notifications through an external notifier
/// (`notify-send` by default).
///
/// Delivery failures are logged at debug level and otherwise ignored.
#[derive(Clone)]
pub struct Notifier {
    runner: Arc<dyn CommandRunner>,
    base: CommandSpec,
    enabled: bool,
}

impl Notifier {
    /// Creates a notifier that appends `title` and `message` to `base`.
    pub fn new(runner: Arc<dyn CommandRunner>, base: CommandSpec) -> Self {
        Self {
            runner,
            base,
            enabled: true,
        }
    }

    /// A notifier that drops everything.
    pub fn disabled(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            base: CommandSpec::new("notify-send"),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Builds the command line for one notification.
    pub fn command_for(&self, title: &str, message: &str) -> CommandSpec {
        self.base.clone().arg(title).arg(message)
    }

    /// Sends a notification and waits for the notifier to exit.
    ///
    /// Returns `false` when disabled or when the notifier failed.
    pub async fn send(&self, title: &str, message: &str) -> bool {
        if !self.enabled {
            return false;
        }
        let spec = self.command_for(title, message);
        let out = self.runner.run(&spec).await;
        if !out.success {
            tracing::debug!(command = %spec, "notification not delivered");
        }
        out.success
    }

    /// Sends a notification in the background. Must be called inside a tokio
    /// runtime.
    pub fn notify(&self, title: impl Into<String>, message: impl Into<String>) {
        if !self.enabled {
            return;
        }
        let this = self.clone();
        let title = title.into();
        let message = message.into();
        tokio::spawn(async move {
            this.send(&title, &message).await;
        });
    }
}
