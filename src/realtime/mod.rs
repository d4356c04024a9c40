//! Realtime Suggestion Notifications
//!
//! Subscribes to the realtime service's broadcast topic and turns each AI
//! suggestion into a platform notification plus a notification-panel entry.
//!
//! ## Architecture
//!
//! - **RealtimeChannel**: websocket connection, channel join, heartbeats, reconnects
//! - **Subscription**: scoped handle; `unsubscribe()` leaves the channel, drop aborts
//! - **SuggestionHandler**: payload → platform notification + `PushNotification`
//! - **PlatformNotifier**: OS notification seam (terminal, log, or a test double)
//!
//! ## Delivery
//!
//! At most once per broadcast. Broadcasts sent while the socket is down are
//! not replayed.
//!
//! ## Example
//!
//! ```rust,no_run
//! use livsync::config::RealtimeConfig;
//! use livsync::realtime::{LogNotifier, RealtimeChannel, SuggestionHandler};
//! use livsync::store::{MemoryStorage, PersistedStore};
//! use livsync::{IdGenerator, Toaster};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = PersistedStore::open(Arc::new(MemoryStorage::new()));
//! let (toaster, _toasts) = Toaster::channel();
//! let handler = Arc::new(SuggestionHandler::new(
//!     store.clone(),
//!     Arc::new(LogNotifier),
//!     Arc::new(IdGenerator::new()),
//!     toaster,
//! ));
//! handler.prepare().await;
//!
//! let channel = RealtimeChannel::new(RealtimeConfig {
//!     url: "https://your-project.supabase.co".to_string(),
//!     api_key: "anon-key".to_string(),
//!     ..RealtimeConfig::default()
//! });
//! let subscription = channel.subscribe(handler).await?;
//! // ... later, on teardown
//! subscription.unsubscribe().await;
//! # Ok(())
//! # }
//! ```

mod channel;
mod handler;
mod messages;
mod notifier;

pub use channel::{
    backoff_delay, ChannelState, RealtimeChannel, RealtimeError, RealtimeResult, Subscription,
};
pub use handler::{
    platform_notification_for, push_notification_for, BroadcastHandler, SuggestionHandler,
    DEFAULT_BODY, DEFAULT_TITLE,
};
pub use messages::{channel_topic, BroadcastMessage, Frame, Inbound, SuggestionPayload};
pub use notifier::{
    LogNotifier, NotifyError, Permission, PlatformNotification, PlatformNotifier, TerminalNotifier,
};
