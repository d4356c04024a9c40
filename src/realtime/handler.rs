//! Suggestion Handler
//!
//! Turns a suggestion broadcast into a platform notification plus a
//! notification-panel entry in the store.

use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::messages::SuggestionPayload;
use super::notifier::{Permission, PlatformNotification, PlatformNotifier};
use crate::ids::IdGenerator;
use crate::models::{NotificationKind, PushNotification, Suggestion};
use crate::store::PersistedStore;
use crate::toast::{Toast, Toaster};

pub const DEFAULT_TITLE: &str = "New Notification";
pub const DEFAULT_BODY: &str = "No additional info";
pub const JUST_NOW: &str = "Just now";

/// Receives the application payload of each matching broadcast
pub trait BroadcastHandler: Send + Sync {
    fn on_broadcast(&self, payload: &Value);
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Platform notification for a suggestion
///
/// Body is the description, then the rationale in parentheses on its own
/// line; `"No additional info"` when both are missing.
pub fn platform_notification_for(suggestion: Option<&Suggestion>) -> PlatformNotification {
    let title = suggestion
        .and_then(|s| non_empty(&s.title))
        .unwrap_or(DEFAULT_TITLE);
    let description = suggestion.and_then(|s| non_empty(&s.description));
    let rationale = suggestion.and_then(|s| non_empty(&s.rationale));

    let body = match (description, rationale) {
        (None, None) => DEFAULT_BODY.to_string(),
        (Some(description), None) => description.to_string(),
        (None, Some(rationale)) => format!("({})", rationale),
        (Some(description), Some(rationale)) => format!("{}\n({})", description, rationale),
    };

    PlatformNotification {
        title: title.to_string(),
        body,
    }
}

/// Notification-panel entry for a suggestion
pub fn push_notification_for(suggestion: Option<&Suggestion>, id: String) -> PushNotification {
    PushNotification {
        id,
        kind: NotificationKind::Activity,
        title: suggestion
            .and_then(|s| non_empty(&s.title))
            .unwrap_or(DEFAULT_TITLE)
            .to_string(),
        message: suggestion
            .and_then(|s| s.description.clone())
            .unwrap_or_default(),
        time: JUST_NOW.to_string(),
        read: false,
    }
}

/// Handles suggestion broadcasts for one subscription
pub struct SuggestionHandler {
    store: PersistedStore,
    notifier: Arc<dyn PlatformNotifier>,
    ids: Arc<IdGenerator>,
    toaster: Toaster,
    notifications_allowed: AtomicBool,
}

impl SuggestionHandler {
    pub fn new(
        store: PersistedStore,
        notifier: Arc<dyn PlatformNotifier>,
        ids: Arc<IdGenerator>,
        toaster: Toaster,
    ) -> Self {
        Self {
            store,
            notifier,
            ids,
            toaster,
            notifications_allowed: AtomicBool::new(true),
        }
    }

    /// Ask for notification permission before the first broadcast
    ///
    /// A denial raises one toast; panel entries are still recorded.
    pub async fn prepare(&self) -> Permission {
        let permission = self.notifier.request_permission().await;
        let allowed = permission == Permission::Granted;
        self.notifications_allowed.store(allowed, Ordering::Relaxed);

        if permission == Permission::Denied {
            tracing::info!("Notification permission denied");
            self.toaster.show(Toast::error(
                "Notifications blocked",
                "Allow notifications to get suggestion alerts",
            ));
        }

        permission
    }

    /// Notify and record one suggestion payload, returning the stored entry
    pub fn handle(&self, payload: &SuggestionPayload) -> PushNotification {
        let suggestion = payload.suggestion.as_ref();

        if self.notifications_allowed.load(Ordering::Relaxed) {
            let notification = platform_notification_for(suggestion);
            if let Err(e) = self.notifier.notify(&notification) {
                tracing::warn!(error = %e, "Platform notification failed");
            }
        }

        let entry = push_notification_for(suggestion, self.ids.next_id());
        self.store.add_notification(entry.clone());

        tracing::debug!(id = %entry.id, title = %entry.title, "Recorded suggestion notification");
        entry
    }
}

impl BroadcastHandler for SuggestionHandler {
    fn on_broadcast(&self, payload: &Value) {
        self.handle(&SuggestionPayload::from_value(payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::notifier::NotifyError;
    use crate::store::MemoryStorage;
    use crate::toast::ToastVariant;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct RecordingNotifier {
        permission: Permission,
        fail: bool,
        shown: Mutex<Vec<PlatformNotification>>,
    }

    impl RecordingNotifier {
        fn new(permission: Permission) -> Self {
            Self {
                permission,
                fail: false,
                shown: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PlatformNotifier for RecordingNotifier {
        async fn request_permission(&self) -> Permission {
            self.permission
        }

        fn notify(&self, notification: &PlatformNotification) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Backend("no display".to_string()));
            }
            self.shown.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    fn setup(
        notifier: Arc<RecordingNotifier>,
    ) -> (SuggestionHandler, PersistedStore, crate::toast::ToastReceiver) {
        let store = PersistedStore::open(Arc::new(MemoryStorage::new()));
        let (toaster, toasts) = Toaster::channel();
        let handler = SuggestionHandler::new(
            store.clone(),
            notifier,
            Arc::new(IdGenerator::new()),
            toaster,
        );
        (handler, store, toasts)
    }

    #[tokio::test]
    async fn test_full_suggestion() {
        let notifier = Arc::new(RecordingNotifier::new(Permission::Granted));
        let (handler, store, _) = setup(notifier.clone());
        handler.prepare().await;

        handler.on_broadcast(&json!({
            "suggestion": {"title": "T", "description": "D", "rationale": "R"}
        }));

        let stored = store.notifications();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].kind, NotificationKind::Activity);
        assert_eq!(stored[0].title, "T");
        assert_eq!(stored[0].message, "D");
        assert_eq!(stored[0].time, "Just now");
        assert!(!stored[0].read);

        let shown = notifier.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].title, "T");
        assert_eq!(shown[0].body, "D\n(R)");
    }

    #[tokio::test]
    async fn test_missing_suggestion_uses_defaults() {
        let notifier = Arc::new(RecordingNotifier::new(Permission::Granted));
        let (handler, store, _) = setup(notifier.clone());

        handler.on_broadcast(&json!({"user_id": "u1"}));

        let stored = store.notifications();
        assert_eq!(stored[0].title, "New Notification");
        assert_eq!(stored[0].message, "");

        let shown = notifier.shown.lock().unwrap();
        assert_eq!(shown[0].title, "New Notification");
        assert_eq!(shown[0].body, "No additional info");
    }

    #[test]
    fn test_body_combinations() {
        let suggestion = |d: Option<&str>, r: Option<&str>| Suggestion {
            title: None,
            description: d.map(String::from),
            rationale: r.map(String::from),
        };

        assert_eq!(
            platform_notification_for(Some(&suggestion(Some("D"), None))).body,
            "D"
        );
        assert_eq!(
            platform_notification_for(Some(&suggestion(None, Some("R")))).body,
            "(R)"
        );
        assert_eq!(
            platform_notification_for(Some(&suggestion(Some(""), Some("")))).body,
            "No additional info"
        );
    }

    #[tokio::test]
    async fn test_permission_denied_still_records() {
        let notifier = Arc::new(RecordingNotifier::new(Permission::Denied));
        let (handler, store, mut toasts) = setup(notifier.clone());

        assert_eq!(handler.prepare().await, Permission::Denied);
        handler.on_broadcast(&json!({"suggestion": {"title": "T"}}));

        assert_eq!(store.notifications().len(), 1);
        assert!(notifier.shown.lock().unwrap().is_empty());

        let toast = toasts.try_recv().unwrap();
        assert_eq!(toast.variant, ToastVariant::Destructive);
        assert!(toasts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notifier_failure_still_records() {
        let notifier = Arc::new(RecordingNotifier {
            fail: true,
            ..RecordingNotifier::new(Permission::Granted)
        });
        let (handler, store, _) = setup(notifier);

        handler.on_broadcast(&json!({"suggestion": {"title": "T"}}));
        assert_eq!(store.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_rapid_events_get_distinct_ids() {
        let notifier = Arc::new(RecordingNotifier::new(Permission::Granted));
        let (handler, store, _) = setup(notifier);

        for _ in 0..50 {
            handler.on_broadcast(&json!({}));
        }

        let mut ids: Vec<String> = store.notifications().into_iter().map(|n| n.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }
}
