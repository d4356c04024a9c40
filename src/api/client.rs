//! LivSync REST API Client
//!
//! HTTP client for the chat, profile, insight and calendar endpoints.

use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::{ApiError, ApiResult};
use crate::config::ApiConfig;
use crate::models::{
    CalendarEvent, CalendarEventList, HealthInsights, NewCalendarEvent, Suggestion, UserProfile,
};

/// LivSync REST API client
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl ApiClient {
    /// Create a new client; fails on a missing or non-http base URL
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        config
            .validate()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ApiError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim().trim_end_matches('/').to_string(),
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send one chat turn and return the assistant's reply
    pub async fn send_chat_message(&self, text: &str) -> ApiResult<String> {
        let body = ChatRequest { user_message: text };
        let request = self.client.post(self.url("/chat/message")).json(&body);

        let reply: ChatResponse = self.execute(request).await?;
        Ok(reply.response)
    }

    /// Fetch the profile of `user_id`
    pub async fn fetch_user_profile(&self, user_id: &str) -> ApiResult<UserProfile> {
        if user_id.trim().is_empty() {
            return Err(ApiError::MissingIdentity);
        }

        let path = format!("/users/{}", urlencoding::encode(user_id));
        self.execute(self.client.get(self.url(&path))).await
    }

    /// Fetch the dashboard insight text
    pub async fn fetch_health_insights(&self) -> ApiResult<HealthInsights> {
        self.execute(self.client.get(self.url("/health/insights")))
            .await
    }

    /// Fetch today's calendar events
    pub async fn fetch_today_events(&self) -> ApiResult<Vec<CalendarEvent>> {
        let list: CalendarEventList = self
            .execute(self.client.get(self.url("/calendar/events/today")))
            .await?;
        Ok(list.events)
    }

    /// Create a calendar event, returning it as stored by the backend
    pub async fn create_calendar_event(&self, event: &NewCalendarEvent) -> ApiResult<CalendarEvent> {
        let request = self.client.post(self.url("/calendar/events")).json(event);
        let created: CreatedEvent = self.execute(request).await?;
        Ok(created.event)
    }

    /// Ask for a suggestion for the rest of the day
    pub async fn fetch_event_day_suggestion(&self) -> ApiResult<Suggestion> {
        let wrapper: SuggestionEnvelope = self
            .execute(self.client.get(self.url("/event-day-suggestion")))
            .await?;
        Ok(wrapper.suggestion)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> ApiResult<T> {
        let response = self.authorize(request).send().await?;
        let response = Self::check_status(response).await?;

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn check_status(response: Response) -> ApiResult<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %text, "API request failed");

        Err(ApiError::Status {
            status: status.as_u16(),
            message: text,
        })
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("authenticated", &self.access_token.is_some())
            .finish()
    }
}

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    user_message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    event: CalendarEvent,
}

#[derive(Debug, Deserialize)]
struct SuggestionEnvelope {
    #[serde(default)]
    suggestion: Suggestion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_missing_base_url() {
        let result = ApiClient::new(&ApiConfig::default());
        assert!(matches!(result, Err(ApiError::Config(_))));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = ApiClient::new(&ApiConfig::new("http://localhost:8000/")).unwrap();
        assert_eq!(client.url("/chat/message"), "http://localhost:8000/chat/message");
    }

    #[test]
    fn test_chat_request_body() {
        let json = serde_json::to_string(&ChatRequest {
            user_message: "hello",
        })
        .unwrap();
        assert_eq!(json, r#"{"user_message":"hello"}"#);
    }

    #[tokio::test]
    async fn test_empty_user_id_is_missing_identity() {
        let client = ApiClient::new(&ApiConfig::new("http://localhost:8000")).unwrap();
        let result = client.fetch_user_profile("  ").await;
        assert!(matches!(result, Err(ApiError::MissingIdentity)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_retryable() {
        // Port 9 (discard) on localhost is closed on test machines
        let client = ApiClient::new(&ApiConfig::new("http://127.0.0.1:9")).unwrap();
        let err = client.send_chat_message("hello").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
