//! Chat Transport
//!
//! One request/response turn with the health assistant. The user's message
//! lands in the store before the request goes out; the assistant's reply is
//! appended when it arrives.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::api::{ApiClient, ApiError, ApiResult};
use crate::ids::IdGenerator;
use crate::models::ChatMessage;
use crate::store::PersistedStore;

/// Remote end of the chat
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the user's text, returning the assistant's reply
    async fn send(&self, text: &str) -> ApiResult<String>;
}

#[async_trait]
impl ChatBackend for ApiClient {
    async fn send(&self, text: &str) -> ApiResult<String> {
        self.send_chat_message(text).await
    }
}

/// Chat failures surfaced to the chat panel
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Assistant request failed: {0}")]
    Api(#[from] ApiError),
}

impl ChatError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::Api(e) => e.is_retryable(),
        }
    }
}

/// Sends chat turns and records both sides in the store
pub struct ChatTransport {
    backend: Arc<dyn ChatBackend>,
    store: PersistedStore,
    ids: Arc<IdGenerator>,
    /// Held for the whole turn so replies land in submission order
    in_flight: Mutex<()>,
}

impl ChatTransport {
    pub fn new(backend: Arc<dyn ChatBackend>, store: PersistedStore, ids: Arc<IdGenerator>) -> Self {
        Self {
            backend,
            store,
            ids,
            in_flight: Mutex::new(()),
        }
    }

    /// Submit the contents of the input field
    ///
    /// Blank input is ignored (`Ok(None)`, no request). Otherwise the user
    /// message is appended and `input` cleared before the request is sent.
    /// On failure the user message stays in the history and no assistant
    /// message is added.
    pub async fn submit(&self, input: &mut String) -> Result<Option<ChatMessage>, ChatError> {
        if input.trim().is_empty() {
            return Ok(None);
        }

        let text = std::mem::take(input);
        self.store
            .add_chat_message(ChatMessage::user(self.ids.next_id(), text.clone()));

        let _turn = self.in_flight.lock().await;

        match self.backend.send(&text).await {
            Ok(reply) => {
                let message = ChatMessage::assistant(self.ids.next_id(), reply);
                self.store.add_chat_message(message.clone());
                Ok(Some(message))
            }
            Err(e) => {
                tracing::warn!(error = %e, retryable = e.is_retryable(), "Chat request failed");
                Err(ChatError::Api(e))
            }
        }
    }

    /// Convenience for callers without an input buffer
    pub async fn send(&self, text: &str) -> Result<Option<ChatMessage>, ChatError> {
        let mut input = text.to_string();
        self.submit(&mut input).await
    }
}
