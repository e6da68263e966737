use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::lenient;

pub const USER_ROLE: &str = "User";
pub const ASSISTANT_ROLE: &str = "assistant";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_wire(&self) -> &'static str {
        match self {
            ChatRole::User => USER_ROLE,
            ChatRole::Assistant => ASSISTANT_ROLE,
        }
    }

    /// Label used in exported documents.
    pub fn label(&self) -> &'static str {
        match self {
            ChatRole::User => "User",
            ChatRole::Assistant => "Assistant",
        }
    }

    pub fn from_wire(role: &str) -> Self {
        if role.eq_ignore_ascii_case(USER_ROLE) {
            ChatRole::User
        } else {
            ChatRole::Assistant
        }
    }
}

/// One transcript entry as the chat history store records it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "lenient::i64")]
    pub user_id: i64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub session_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub message: String,
    #[serde(default)]
    pub updated_date_time: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub caching_enabled: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_bool")]
    pub routing_enabled: Option<bool>,
}

impl ChatMessage {
    pub fn chat_role(&self) -> ChatRole {
        ChatRole::from_wire(&self.role)
    }
}

/// Entry held in the in-memory transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatEntry {
    pub fn user(message: &str) -> Self {
        Self {
            role: ChatRole::User,
            message: message.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(message: &str) -> Self {
        Self {
            role: ChatRole::Assistant,
            message: message.to_string(),
            timestamp: Utc::now(),
        }
    }
}

impl From<&ChatMessage> for ChatEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            role: message.chat_role(),
            message: message.message.clone(),
            timestamp: message.updated_date_time.unwrap_or_else(Utc::now),
        }
    }
}

/// Session listed in the recent-chats sidebar, labelled by its newest user message.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentChat {
    pub session_id: String,
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Row of `ChatHistory/user/{userId}`: only the session id is used.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChatSession {
    #[serde(default, deserialize_with = "lenient::string")]
    pub session_id: String,
}
