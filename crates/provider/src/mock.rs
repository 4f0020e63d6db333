use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::adapter::ProviderAdapter;
use crate::error::CompletionError;
use crate::types::{Completion, CompletionRequest};

/// Scripted behavior for one API key.
#[derive(Debug, Clone)]
enum MockBehavior {
    Succeed { content: String, tokens: u64 },
    Fail { status: u16, message: String },
    TimeOut,
}

/// One call observed by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub api_key: String,
    pub feature: String,
}

/// A scripted adapter for tests.
///
/// Behaviors are keyed by the plaintext API key the caller passes in, which
/// is how router tests distinguish credentials. Keys without a script fail
/// with a 401 so forgotten setup is loud.
#[derive(Default)]
pub struct MockAdapter {
    behaviors: Mutex<HashMap<String, MockBehavior>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockAdapter {
    /// Create a mock with no scripted keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a key to succeed with the given content and token count.
    pub fn succeed_for(&self, api_key: impl Into<String>, content: impl Into<String>, tokens: u64) {
        self.behaviors.lock().unwrap().insert(
            api_key.into(),
            MockBehavior::Succeed {
                content: content.into(),
                tokens,
            },
        );
    }

    /// Script a key to fail with the given vendor status and message.
    pub fn fail_for(&self, api_key: impl Into<String>, status: u16, message: impl Into<String>) {
        self.behaviors.lock().unwrap().insert(
            api_key.into(),
            MockBehavior::Fail {
                status,
                message: message.into(),
            },
        );
    }

    /// Script a key to time out.
    pub fn time_out_for(&self, api_key: impl Into<String>) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(api_key.into(), MockBehavior::TimeOut);
    }

    /// All calls received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> Result<Completion, CompletionError> {
        self.calls.lock().unwrap().push(MockCall {
            api_key: api_key.to_owned(),
            feature: request.feature.clone(),
        });

        let behavior = self.behaviors.lock().unwrap().get(api_key).cloned();
        match behavior {
            Some(MockBehavior::Succeed { content, tokens }) => Ok(Completion {
                content,
                tokens_used: tokens,
                model_id: "mock/model".to_owned(),
            }),
            Some(MockBehavior::Fail { status, message }) => Err(CompletionError::Api {
                status,
                message,
                token_limit: false,
            }),
            Some(MockBehavior::TimeOut) => Err(CompletionError::Timeout(
                std::time::Duration::from_secs(60),
            )),
            None => Err(CompletionError::Api {
                status: 401,
                message: format!("unscripted key: {api_key}"),
                token_limit: false,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_success_and_failure() {
        let mock = MockAdapter::new();
        mock.succeed_for("good-key", "content", 12);
        mock.fail_for("bad-key", 500, "upstream exploded");

        let request = CompletionRequest::new("chat", "hello");

        let ok = mock.complete("good-key", &request).await.unwrap();
        assert_eq!(ok.content, "content");
        assert_eq!(ok.tokens_used, 12);

        let err = mock.complete("bad-key", &request).await.unwrap_err();
        assert!(matches!(err, CompletionError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn unscripted_key_fails_loudly() {
        let mock = MockAdapter::new();
        let err = mock
            .complete("mystery", &CompletionRequest::new("chat", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn calls_recorded_in_order() {
        let mock = MockAdapter::new();
        mock.succeed_for("k", "ok", 1);
        let request = CompletionRequest::new("mcq", "q");
        mock.complete("a", &request).await.ok();
        mock.complete("k", &request).await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].api_key, "a");
        assert_eq!(calls[1].api_key, "k");
        assert_eq!(calls[1].feature, "mcq");
    }
}
