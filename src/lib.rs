//! # LivSync
//!
//! Client core for the LivSync wellness dashboard: session state for the
//! notification and chat panels, realtime AI-suggestion notifications, the
//! health assistant chat, and a push-to-talk voice adapter.
//!
//! ## Features
//!
//! - **Persisted store**: notifications and chat history survive restarts of a session
//! - **Realtime suggestions**: broadcast channel subscription with reconnects
//! - **Chat**: one request/response turn per message, replies in submission order
//! - **Voice input**: final transcripts only, interim results dropped
//!
//! ## Modules
//!
//! - [`store`]: persisted notification/chat store
//! - [`realtime`]: broadcast channel subscription and suggestion notifications
//! - [`chat`]: chat transport over the API client
//! - [`voice`]: speech recognizer adapter
//! - [`api`]: REST client for the LivSync service
//! - [`session`]: app context wiring it all together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livsync::config::Config;
//! use livsync::session::AppContext;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_default();
//!     let (context, _toasts) = AppContext::from_config(config)?;
//!
//!     if let Some(reply) = context.chat()?.send("How did I sleep?").await? {
//!         println!("{}", reply.content);
//!     }
//!
//!     println!("{} unread notifications", context.store().unread_count());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod chat;
pub mod config;
pub mod ids;
pub mod models;
pub mod realtime;
pub mod session;
pub mod store;
pub mod toast;
pub mod voice;

pub use ids::IdGenerator;
pub use session::{AppContext, Loadable};
pub use toast::{Toast, ToastVariant, Toaster};
