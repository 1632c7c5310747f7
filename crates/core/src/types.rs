use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-tenant credentials issued by the LINE platform.
/// The channel secret signs inbound webhooks; the access token
/// authorizes outbound API calls.
#[derive(Debug, Clone)]
pub struct LineCredentials {
    pub channel_secret: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Sticker,
    Location,
    Other,
}

impl MessageKind {
    pub fn from_platform(message_type: &str) -> Self {
        match message_type {
            "text" => MessageKind::Text,
            "image" => MessageKind::Image,
            "sticker" => MessageKind::Sticker,
            "location" => MessageKind::Location,
            _ => MessageKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Sticker => "sticker",
            MessageKind::Location => "location",
            MessageKind::Other => "other",
        }
    }
}

/// One append-only row of the conversation audit log.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationEntry {
    pub tenant_id: String,
    pub user_id: String,
    pub kind: MessageKind,
    pub user_message: String,
    pub bot_reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ConversationEntry {
    pub fn text(tenant_id: &str, user_id: &str, user_message: &str, bot_reply: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            user_id: user_id.to_string(),
            kind: MessageKind::Text,
            user_message: user_message.to_string(),
            bot_reply: Some(bot_reply.to_string()),
            metadata: None,
        }
    }
}

/// Stored conversation row, as returned by the read API.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationRecord {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub message_type: String,
    pub user_message: String,
    pub bot_reply: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineUserRecord {
    pub tenant_id: String,
    pub line_user_id: String,
    pub display_name: Option<String>,
    pub is_blocked: bool,
    pub first_interaction_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
}

/// Tenant-scoped business facts fed into the AI reply prompt.
#[derive(Debug, Clone, Default)]
pub struct CustomerProfile {
    pub name: Option<String>,
    pub budget_min: Option<i64>,
    pub budget_max: Option<i64>,
    pub desired_area: Option<String>,
    pub desired_floor_plan: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertySummary {
    pub id: String,
    pub title: String,
    pub rent_price: Option<i64>,
    pub floor_plan: Option<String>,
    pub station: Option<String>,
    pub walking_minutes: Option<i64>,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

/// One prior exchange in a conversation, oldest first when windowed.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}
