use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use vaidya_core::{features, ChatSession, Message, MessageRole};
use vaidya_provider::CompletionRequest;
use vaidya_store::{ChatStore, UserStore};

use crate::documents::DocumentPipeline;
use crate::error::GatewayError;
use crate::quota::RateLimiter;
use crate::router::ModelRouter;

/// System prompt for conversational chat.
const CHAT_SYSTEM_PROMPT: &str = "You are a knowledgeable medical education assistant. \
    Answer with clinically accurate, exam-oriented explanations. When excerpts from the \
    user's own documents are provided, ground your answer in them and mention which \
    source you used.";

/// Chat sessions and messages, with retrieval-augmented routing.
#[derive(Clone)]
pub struct ChatService {
    chats: Arc<dyn ChatStore>,
    users: Arc<dyn UserStore>,
    router: Arc<ModelRouter>,
    limiter: RateLimiter,
    documents: DocumentPipeline,
}

impl ChatService {
    /// Build the service.
    #[must_use]
    pub fn new(
        chats: Arc<dyn ChatStore>,
        users: Arc<dyn UserStore>,
        router: Arc<ModelRouter>,
        limiter: RateLimiter,
        documents: DocumentPipeline,
    ) -> Self {
        Self {
            chats,
            users,
            router,
            limiter,
            documents,
        }
    }

    async fn ensure_enabled_user(&self, user_id: &str) -> Result<(), GatewayError> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("user {user_id}")))?;
        if user.disabled {
            return Err(GatewayError::AccountDisabled);
        }
        Ok(())
    }

    /// Create a session for a user.
    pub async fn create_session(
        &self,
        user_id: &str,
        title: Option<String>,
    ) -> Result<ChatSession, GatewayError> {
        self.ensure_enabled_user(user_id).await?;
        let now = Utc::now();
        let session = ChatSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            title: title.unwrap_or_else(|| "New chat".to_owned()),
            created_at: now,
            updated_at: now,
        };
        self.chats.insert_session(session.clone()).await?;
        Ok(session)
    }

    /// A user's sessions, most recently active first.
    pub async fn list_sessions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ChatSession>, GatewayError> {
        Ok(self.chats.list_sessions(user_id, limit).await?)
    }

    /// Messages of a session the user owns.
    pub async fn list_messages(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<Message>, GatewayError> {
        self.owned_session(user_id, session_id).await?;
        Ok(self.chats.list_messages(session_id).await?)
    }

    async fn owned_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<ChatSession, GatewayError> {
        let session = self
            .chats
            .get_session(session_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("session {session_id}")))?;
        if session.user_id != user_id {
            return Err(GatewayError::NotFound(format!("session {session_id}")));
        }
        Ok(session)
    }

    /// Send one message: admit against quota, retrieve document context,
    /// route, persist both sides, and count usage.
    #[instrument(skip(self, content))]
    pub async fn send_message(
        &self,
        user_id: &str,
        session_id: &str,
        content: &str,
    ) -> Result<Message, GatewayError> {
        if content.trim().is_empty() {
            return Err(GatewayError::InvalidInput("empty message".to_owned()));
        }
        self.ensure_enabled_user(user_id).await?;
        self.owned_session(user_id, session_id).await?;

        if !self.limiter.check(user_id, features::CHAT).await {
            return Err(GatewayError::QuotaExceeded {
                usage: self.limiter.remaining(user_id).await,
            });
        }

        // Retrieval context, when the user has any completed document.
        let rag = self.documents.rag_context(user_id, content).await?;
        let (prompt, citations) = match rag {
            Some((block, citations)) => {
                info!(sources = citations.len(), "augmenting prompt with document context");
                (format!("{block}Question: {content}"), Some(citations))
            }
            None => (content.to_owned(), None),
        };

        self.chats
            .append_message(Message {
                id: Uuid::new_v4().to_string(),
                session_id: session_id.to_owned(),
                role: MessageRole::User,
                content: content.to_owned(),
                tokens_used: None,
                citations: None,
                created_at: Utc::now(),
            })
            .await?;

        let outcome = self
            .router
            .route(
                Some(user_id),
                CompletionRequest::new(features::CHAT, prompt)
                    .with_system_prompt(CHAT_SYSTEM_PROMPT),
            )
            .await?;

        let reply = Message {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_owned(),
            role: MessageRole::Assistant,
            content: outcome.content.clone(),
            tokens_used: Some(outcome.tokens_used),
            citations,
            created_at: Utc::now(),
        };
        self.chats.append_message(reply.clone()).await?;

        self.limiter
            .increment(user_id, outcome.tokens_used, features::CHAT)
            .await;

        Ok(reply)
    }
}
