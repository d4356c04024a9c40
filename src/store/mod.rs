//! Client State Store
//!
//! Session-scoped state for the notification panel and the chat panel.
//!
//! ## Architecture
//!
//! - **PersistedStore**: two append/clear lists, snapshot reads, watch-based subscriptions
//! - **SessionStorage**: key/value slot the store writes its JSON snapshot to
//!   - `MemoryStorage` for tests and throwaway sessions
//!   - `FileStorage` for a session directory on disk
//!
//! Persistence failures never touch in-memory state; they are logged and counted.

mod backend;
mod error;
mod persisted;

pub use backend::{FileStorage, MemoryStorage, SessionStorage};
pub use error::{StoreError, StoreResult};
pub use persisted::{
    decode_snapshot, encode_snapshot, PersistedStore, StoreSnapshot, SNAPSHOT_VERSION, STORE_KEY,
};
