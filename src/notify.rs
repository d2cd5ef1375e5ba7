//! Result notifications.
//!
//! The formatter and the runner report outcomes through the `Notifier` trait.
//! Delivery is fire-and-forget: a notifier never reports errors back to the
//! caller.

use console::style;
use std::process::{Command, Stdio};

/// Title attached to every notification.
pub const NOTIFICATION_TITLE: &str = "OCUnit results";

/// Severity image of a test run, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Image {
    Success,
    Pending,
    Failed,
}

impl Image {
    /// Classify a run by its failure and pending counts.
    pub fn classify(failure_count: usize, pending_count: usize) -> Self {
        if failure_count > 0 {
            Image::Failed
        } else if pending_count > 0 {
            Image::Pending
        } else {
            Image::Success
        }
    }

    /// Notification priority for this image.
    pub fn priority(self) -> i32 {
        match self {
            Image::Failed => 2,
            Image::Pending => -1,
            Image::Success => -2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Image::Success => "success",
            Image::Pending => "pending",
            Image::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub title: String,
    pub image: Image,
    pub priority: i32,
}

impl Notification {
    /// Build a notification with the standard title and the image's priority.
    pub fn new(message: impl Into<String>, image: Image) -> Self {
        Self {
            message: message.into(),
            title: NOTIFICATION_TITLE.to_string(),
            image,
            priority: image.priority(),
        }
    }

    /// The bare "Failed" notice sent when a build or test process breaks.
    pub fn run_failed() -> Self {
        Self::new("Failed", Image::Failed)
    }
}

/// Delivers notifications somewhere the user will see them.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Prints notifications to the terminal and records them in the log.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        let text = notification.message.replace('\n', " ");
        let styled = match notification.image {
            Image::Success => style(text).green(),
            Image::Pending => style(text).yellow(),
            Image::Failed => style(text).red(),
        };
        eprintln!("{} {}", style(&notification.title).bold(), styled);
        tracing::debug!(
            image = %notification.image,
            priority = notification.priority,
            "notification delivered"
        );
    }
}

/// Runs an external program for every notification.
///
/// The program receives the title and the message as its two arguments, so
/// `notify-send` and `terminal-notifier`-style wrappers work directly.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
}

impl CommandNotifier {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Notifier for CommandNotifier {
    fn notify(&self, notification: &Notification) {
        let result = Command::new(&self.program)
            .arg(&notification.title)
            .arg(&notification.message)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match result {
            Ok(mut child) => {
                // Reap off-thread; the notifier may outlive the run.
                let program = self.program.clone();
                std::thread::spawn(move || match child.wait() {
                    Ok(status) if !status.success() => {
                        tracing::debug!(program = %program, %status, "notification command exited with failure");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(program = %program, error = %e, "failed to wait for notification command");
                    }
                });
            }
            Err(e) => {
                tracing::warn!(program = %self.program, error = %e, "notification command failed to start");
            }
        }
    }
}
