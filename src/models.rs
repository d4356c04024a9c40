//! Data Model
//!
//! Entries held by the persisted store, plus the JSON shapes exchanged
//! with the LivSync API.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Category of a push notification, used by the view for icon and color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Health,
    Activity,
    Sleep,
    Achievement,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Health => "health",
            NotificationKind::Activity => "activity",
            NotificationKind::Sleep => "sleep",
            NotificationKind::Achievement => "achievement",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification shown in the notification panel
///
/// Appended once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushNotification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Display label such as "Just now", not a timestamp
    pub time: String,
    pub read: bool,
}

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatRole::User => f.write_str("user"),
            ChatRole::Assistant => f.write_str("assistant"),
        }
    }
}

/// One entry of the chat history; insertion order is display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

// ============================================
// API DTOs
// ============================================

/// Profile returned by `GET /users/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// The backend has served both numeric and uuid identifiers
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub custom_goals: String,
    #[serde(default)]
    pub activity_level: String,
    #[serde(default)]
    pub step_goal: u32,
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub height: f64,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

/// Dashboard insight text from `GET /health/insights`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthInsights {
    pub response_text: String,
}

/// AI suggestion carried by realtime broadcasts and `GET /event-day-suggestion`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// Start/end of a calendar event; the backend mixes unix seconds and strings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventWhen {
    #[serde(default)]
    pub start_time: Option<serde_json::Value>,
    #[serde(default)]
    pub end_time: Option<serde_json::Value>,
}

/// Calendar event as listed by the calendar endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub when: Option<EventWhen>,
    #[serde(default)]
    pub updated_at: Option<i64>,
}

impl CalendarEvent {
    /// Title for display, "Untitled" when the event has none
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled")
    }
}

/// Response of `GET /calendar/events/today`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarEventList {
    #[serde(default)]
    pub events: Vec<CalendarEvent>,
    #[serde(default)]
    pub count: usize,
}

/// Body of `POST /calendar/events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCalendarEvent {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Unix seconds or ISO 8601
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_wire_format() {
        let notification = PushNotification {
            id: "1699000000000".to_string(),
            kind: NotificationKind::Activity,
            title: "Walk".to_string(),
            message: "Take a walk".to_string(),
            time: "Just now".to_string(),
            read: false,
        };

        let json = serde_json::to_string(&notification).unwrap();
        assert!(json.contains("\"type\":\"activity\""));
        assert!(json.contains("\"read\":false"));
    }

    #[test]
    fn test_chat_message_roles() {
        let msg: ChatMessage =
            serde_json::from_str(r#"{"id":"1","role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(msg.role, ChatRole::Assistant);
        assert_eq!(msg, ChatMessage::assistant("1", "hi"));
    }

    #[test]
    fn test_user_profile_numeric_id() {
        let json = r#"{
            "id": 42,
            "full_name": "Ada Lovelace",
            "email": "ada@example.com",
            "custom_goals": "Sleep more",
            "activity_level": "moderate",
            "step_goal": 9000,
            "dob": "1990-12-10",
            "gender": "female",
            "weight": 60,
            "height": 168
        }"#;

        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.id, "42");
        assert_eq!(profile.step_goal, 9000);
        assert_eq!(profile.dob, NaiveDate::from_ymd_opt(1990, 12, 10));
        assert_eq!(profile.height, 168.0);
    }

    #[test]
    fn test_suggestion_ignores_extra_fields() {
        let suggestion: Suggestion =
            serde_json::from_str(r#"{"title":"Stretch","duration":"10 min"}"#).unwrap();
        assert_eq!(suggestion.title.as_deref(), Some("Stretch"));
        assert!(suggestion.description.is_none());
    }

    #[test]
    fn test_calendar_event_display_title() {
        let event: CalendarEvent = serde_json::from_str(r#"{"id":"e1","title":""}"#).unwrap();
        assert_eq!(event.display_title(), "Untitled");
    }
}
