//! Toasts
//!
//! Transient user-visible messages (permission denied, voice input errors).
//! Producers hold a cloneable [`Toaster`]; the view drains the receiver.

use tokio::sync::mpsc;

/// Visual weight of a toast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastVariant {
    Default,
    Destructive,
}

/// A transient message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub variant: ToastVariant,
}

impl Toast {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: ToastVariant::Default,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: ToastVariant::Destructive,
        }
    }
}

/// Receiving end, owned by the view
pub type ToastReceiver = mpsc::UnboundedReceiver<Toast>;

/// Handle for raising toasts
#[derive(Debug, Clone)]
pub struct Toaster {
    sender: mpsc::UnboundedSender<Toast>,
}

impl Toaster {
    pub fn channel() -> (Self, ToastReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Show a toast. Dropped silently once the view is gone.
    pub fn show(&self, toast: Toast) {
        tracing::debug!(title = %toast.title, variant = ?toast.variant, "Toast");
        let _ = self.sender.send(toast);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toasts_arrive_in_order() {
        let (toaster, mut rx) = Toaster::channel();
        toaster.show(Toast::info("Listening...", "Speak now"));
        toaster.show(Toast::error("Voice input error", "Failed"));

        assert_eq!(rx.try_recv().unwrap().variant, ToastVariant::Default);
        assert_eq!(rx.try_recv().unwrap().variant, ToastVariant::Destructive);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_show_without_receiver() {
        let (toaster, rx) = Toaster::channel();
        drop(rx);
        toaster.show(Toast::info("ignored", ""));
    }
}
