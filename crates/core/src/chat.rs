use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::plan::UnknownVariant;

/// A chat session owned by a user. Owns its [`Message`]s (cascade delete).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    /// Short string form, matching the persisted representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(UnknownVariant {
                kind: "message role",
                value: other.to_owned(),
            }),
        }
    }
}

/// A single message within a chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier (UUID v4).
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    /// Tokens consumed producing this message (assistant messages only).
    pub tokens_used: Option<u64>,
    /// Retrieved document sources backing this message, if any.
    pub citations: Option<Vec<Citation>>,
    pub created_at: DateTime<Utc>,
}

/// A reference to a retrieved document chunk that informed a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub document_id: String,
    pub document_filename: String,
    pub chunk_index: i32,
    pub similarity_score: f32,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn role_roundtrip() {
        for role in [MessageRole::User, MessageRole::Assistant, MessageRole::System] {
            assert_eq!(MessageRole::from_str(role.as_str()).unwrap(), role);
        }
        assert!(MessageRole::from_str("bot").is_err());
    }

    #[test]
    fn message_with_citations_serializes() {
        let msg = Message {
            id: "m1".into(),
            session_id: "s1".into(),
            role: MessageRole::Assistant,
            content: "Aspirin irreversibly inhibits COX-1.".into(),
            tokens_used: Some(120),
            citations: Some(vec![Citation {
                document_id: "d1".into(),
                document_filename: "pharm.pdf".into(),
                chunk_index: 4,
                similarity_score: 0.91,
            }]),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.citations.unwrap()[0].chunk_index, 4);
    }
}
