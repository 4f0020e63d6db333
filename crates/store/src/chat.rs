use async_trait::async_trait;

use vaidya_core::{ChatSession, Message};

use crate::error::StoreError;

/// Storage for chat sessions and their messages.
///
/// A session owns its messages: deleting the session removes them.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Insert a new session.
    async fn insert_session(&self, session: ChatSession) -> Result<(), StoreError>;

    /// Fetch a session by id.
    async fn get_session(&self, id: &str) -> Result<Option<ChatSession>, StoreError>;

    /// Sessions owned by a user, most recently updated first.
    async fn list_sessions(&self, user_id: &str, limit: u32)
        -> Result<Vec<ChatSession>, StoreError>;

    /// Append a message to a session and bump the session's `updated_at`.
    async fn append_message(&self, message: Message) -> Result<(), StoreError>;

    /// Messages of a session in chronological order.
    async fn list_messages(&self, session_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Delete a session and its messages. Returns `true` if it existed.
    async fn delete_session(&self, id: &str) -> Result<bool, StoreError>;
}
