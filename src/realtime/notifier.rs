//! Platform Notifications
//!
//! The OS-level notification shown when a suggestion arrives. Permission is
//! asked once; a denial is remembered by the caller.

use async_trait::async_trait;
use std::io::Write;
use std::sync::Mutex;
use thiserror::Error;

/// Outcome of a permission prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    /// User dismissed the prompt without choosing
    Default,
}

/// Title and body of a platform notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformNotification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification permission denied")]
    PermissionDenied,

    #[error("Notification backend failed: {0}")]
    Backend(String),
}

/// Platform notification capability
#[async_trait]
pub trait PlatformNotifier: Send + Sync {
    /// Ask the user for permission; may wait on a prompt
    async fn request_permission(&self) -> Permission;

    fn notify(&self, notification: &PlatformNotification) -> Result<(), NotifyError>;
}

/// Emits notifications as log events only
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl PlatformNotifier for LogNotifier {
    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn notify(&self, notification: &PlatformNotification) -> Result<(), NotifyError> {
        tracing::info!(title = %notification.title, body = %notification.body, "Notification");
        Ok(())
    }
}

/// Writes notifications to a terminal (stdout by default)
pub struct TerminalNotifier {
    out: Mutex<Box<dyn Write + Send>>,
}

impl TerminalNotifier {
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

#[async_trait]
impl PlatformNotifier for TerminalNotifier {
    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn notify(&self, notification: &PlatformNotification) -> Result<(), NotifyError> {
        let mut out = self
            .out
            .lock()
            .map_err(|e| NotifyError::Backend(e.to_string()))?;

        writeln!(out, "[notification] {}", notification.title)
            .and_then(|_| {
                for line in notification.body.lines() {
                    writeln!(out, "    {}", line)?;
                }
                out.flush()
            })
            .map_err(|e| NotifyError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_terminal_notifier_output() {
        let buf = SharedBuf::default();
        let notifier = TerminalNotifier::new(Box::new(buf.clone()));

        assert_eq!(notifier.request_permission().await, Permission::Granted);
        notifier
            .notify(&PlatformNotification {
                title: "Walk".to_string(),
                body: "Take a walk\n(You sat all day)".to_string(),
            })
            .unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(
            text,
            "[notification] Walk\n    Take a walk\n    (You sat all day)\n"
        );
    }

    #[test]
    fn test_log_notifier() {
        let notification = PlatformNotification {
            title: "t".to_string(),
            body: "b".to_string(),
        };
        assert!(LogNotifier.notify(&notification).is_ok());
    }
}
