//! App Context
//!
//! Wires the store, API client, chat transport and toast sink together for
//! one signed-in session. Views read fetch results as [`Loadable`] values and
//! never see transport errors directly.
//!
//! The store works without an API. A missing or invalid base URL only fails
//! the calls that need the server.

use std::sync::Arc;
use thiserror::Error;

use crate::api::{ApiClient, ApiError, ApiResult};
use crate::chat::ChatTransport;
use crate::config::Config;
use crate::ids::IdGenerator;
use crate::models::{CalendarEvent, HealthInsights, NewCalendarEvent, Suggestion, UserProfile};
use crate::realtime::{
    PlatformNotifier, RealtimeChannel, RealtimeResult, Subscription, SuggestionHandler,
};
use crate::store::{FileStorage, PersistedStore, SessionStorage, StoreError};
use crate::toast::{ToastReceiver, Toaster};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session storage unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Result of a fetch as the view sees it
#[derive(Debug, Clone, PartialEq)]
pub enum Loadable<T> {
    Ready(T),
    Failed { message: String, retryable: bool },
}

impl<T> Loadable<T> {
    pub fn from_result(result: ApiResult<T>) -> Self {
        match result {
            Ok(value) => Loadable::Ready(value),
            Err(e) => Loadable::Failed {
                message: e.to_string(),
                retryable: e.is_retryable(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Loadable::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            Loadable::Ready(value) => Some(value),
            Loadable::Failed { .. } => None,
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            Loadable::Ready(value) => Ok(value),
            Loadable::Failed { message, .. } => Err(message),
        }
    }
}

/// Everything a view needs for one session
pub struct AppContext {
    config: Config,
    store: PersistedStore,
    /// Client and transport, or why they could not be built
    remote: Result<Remote, String>,
    toaster: Toaster,
    ids: Arc<IdGenerator>,
}

struct Remote {
    api: ApiClient,
    chat: ChatTransport,
}

impl AppContext {
    /// Build the context with the snapshot stored under `config.store.dir`
    pub fn from_config(config: Config) -> Result<(Self, ToastReceiver), SessionError> {
        let storage = FileStorage::open(&config.store.dir)?;
        Self::with_storage(config, Arc::new(storage))
    }

    /// Build the context over an explicit storage backend
    pub fn with_storage(
        config: Config,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<(Self, ToastReceiver), SessionError> {
        let store = PersistedStore::open(storage);
        let ids = Arc::new(IdGenerator::new());
        let (toaster, toasts) = Toaster::channel();

        let remote = match ApiClient::new(&config.api) {
            Ok(api) => {
                let chat = ChatTransport::new(Arc::new(api.clone()), store.clone(), Arc::clone(&ids));
                Ok(Remote { api, chat })
            }
            Err(e) => {
                tracing::debug!(error = %e, "API client unavailable, store only");
                Err(e.to_string())
            }
        };

        tracing::debug!(
            api = remote.as_ref().map(|r| r.api.base_url()).unwrap_or("-"),
            notifications = store.notifications().len(),
            messages = store.chat_messages().len(),
            "Session context ready"
        );

        let context = Self {
            config,
            store,
            remote,
            toaster,
            ids,
        };
        Ok((context, toasts))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &PersistedStore {
        &self.store
    }

    fn remote(&self) -> ApiResult<&Remote> {
        self.remote
            .as_ref()
            .map_err(|message| ApiError::Config(message.clone()))
    }

    /// REST client, or the configuration error that prevented building it
    pub fn api(&self) -> ApiResult<&ApiClient> {
        self.remote().map(|r| &r.api)
    }

    pub fn chat(&self) -> ApiResult<&ChatTransport> {
        self.remote().map(|r| &r.chat)
    }

    pub fn toaster(&self) -> &Toaster {
        &self.toaster
    }

    /// Subscribe to suggestion broadcasts, notifying through `notifier`
    pub async fn start_realtime(
        &self,
        notifier: Arc<dyn PlatformNotifier>,
    ) -> RealtimeResult<Subscription> {
        let handler = Arc::new(SuggestionHandler::new(
            self.store.clone(),
            notifier,
            Arc::clone(&self.ids),
            self.toaster.clone(),
        ));
        handler.prepare().await;

        RealtimeChannel::new(self.config.realtime.clone())
            .subscribe(handler)
            .await
    }

    /// Profile of the signed-in user
    pub async fn user_profile(&self) -> Loadable<UserProfile> {
        let result = match (self.api(), self.config.session.user_id.as_deref()) {
            (Err(e), _) => Err(e),
            (Ok(_), None) => Err(ApiError::MissingIdentity),
            (Ok(api), Some(user_id)) => api.fetch_user_profile(user_id).await,
        };
        Loadable::from_result(result)
    }

    pub async fn health_insights(&self) -> Loadable<HealthInsights> {
        let result = match self.api() {
            Ok(api) => api.fetch_health_insights().await,
            Err(e) => Err(e),
        };
        Loadable::from_result(result)
    }

    pub async fn today_events(&self) -> Loadable<Vec<CalendarEvent>> {
        let result = match self.api() {
            Ok(api) => api.fetch_today_events().await,
            Err(e) => Err(e),
        };
        Loadable::from_result(result)
    }

    pub async fn event_day_suggestion(&self) -> Loadable<Suggestion> {
        let result = match self.api() {
            Ok(api) => api.fetch_event_day_suggestion().await,
            Err(e) => Err(e),
        };
        Loadable::from_result(result)
    }

    pub async fn create_event(&self, event: &NewCalendarEvent) -> Loadable<CalendarEvent> {
        let result = match self.api() {
            Ok(api) => api.create_calendar_event(event).await,
            Err(e) => Err(e),
        };
        Loadable::from_result(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::models::ChatMessage;
    use crate::store::MemoryStorage;
    use tempfile::TempDir;

    fn config(base_url: &str) -> Config {
        Config {
            api: ApiConfig::new(base_url),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_store_works_without_api_url() {
        let (context, _toasts) =
            AppContext::with_storage(Config::default(), Arc::new(MemoryStorage::new())).unwrap();

        context
            .store()
            .add_chat_message(ChatMessage::user("1", "kept locally"));
        assert_eq!(context.store().chat_messages().len(), 1);
        context.store().clear_notifications();
        assert!(context.store().notifications().is_empty());

        assert!(matches!(context.chat(), Err(ApiError::Config(_))));
        assert!(matches!(context.api(), Err(ApiError::Config(_))));
        assert!(matches!(
            context.health_insights().await,
            Loadable::Failed { retryable: false, .. }
        ));
    }

    #[test]
    fn test_from_config_restores_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut config = config("http://127.0.0.1:9");
        config.store.dir = dir.path().to_string_lossy().to_string();

        {
            let (context, _toasts) = AppContext::from_config(config.clone()).unwrap();
            context
                .store()
                .add_chat_message(ChatMessage::user("1", "remember me"));
        }

        let (context, _toasts) = AppContext::from_config(config).unwrap();
        let messages = context.store().chat_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "remember me");
    }

    #[tokio::test]
    async fn test_profile_without_identity() {
        let (context, _toasts) =
            AppContext::with_storage(config("http://127.0.0.1:9"), Arc::new(MemoryStorage::new()))
                .unwrap();

        match context.user_profile().await {
            Loadable::Failed { retryable, .. } => assert!(!retryable),
            Loadable::Ready(_) => panic!("expected failure without a user id"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_api_is_retryable_failure() {
        let (context, _toasts) =
            AppContext::with_storage(config("http://127.0.0.1:9"), Arc::new(MemoryStorage::new()))
                .unwrap();

        let insights = context.health_insights().await;
        assert!(!insights.is_ready());
        assert!(matches!(insights, Loadable::Failed { retryable: true, .. }));
    }

    #[test]
    fn test_loadable_conversions() {
        let ready: Loadable<u32> = Loadable::from_result(Ok(3));
        assert_eq!(ready.ready(), Some(&3));
        assert_eq!(ready.into_result(), Ok(3));

        let failed: Loadable<u32> = Loadable::from_result(Err(ApiError::Status {
            status: 404,
            message: "not found".to_string(),
        }));
        assert!(matches!(failed, Loadable::Failed { retryable: false, .. }));
        assert!(failed.into_result().is_err());
    }
}
