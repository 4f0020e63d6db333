use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use vaidya_core::features;
use vaidya_provider::CompletionRequest;
use vaidya_store::UserStore;

use crate::error::GatewayError;
use crate::quota::RateLimiter;
use crate::router::ModelRouter;

/// System prompt shared by the study-tool generators.
const COMMAND_SYSTEM_PROMPT: &str = "You are a medical education specialist with expertise \
    in the MBBS curriculum and medical licensing exams (USMLE, NEET-PG). Produce clinically \
    relevant, evidence-based material using standard medical terminology, focused on what \
    students need for clinical practice and examinations.";

/// A generated study artifact.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    /// The command that produced this output (feature tag).
    pub command: String,
    /// The topic requested.
    pub topic: String,
    /// Generated text.
    pub content: String,
    /// Tokens consumed.
    pub tokens_used: u64,
}

/// Structured generation commands: flashcards, MCQs, summaries,
/// explanations and concept maps over a topic.
#[derive(Clone)]
pub struct CommandService {
    users: Arc<dyn UserStore>,
    router: Arc<ModelRouter>,
    limiter: RateLimiter,
}

impl CommandService {
    /// Build the service.
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, router: Arc<ModelRouter>, limiter: RateLimiter) -> Self {
        Self {
            users,
            router,
            limiter,
        }
    }

    fn prompt_for(feature: &str, topic: &str) -> Option<String> {
        let prompt = match feature {
            features::FLASHCARD => format!(
                "Generate 5-7 medical flashcards about {topic} for MBBS students.\n\n\
                 Format each flashcard as:\n\
                 Q: [Question]\n\
                 A: [Answer]\n\n\
                 Focus on clinically relevant, evidence-based facts tested in licensing \
                 exams, emphasizing pathophysiology, diagnosis and treatment principles."
            ),
            features::MCQ => format!(
                "Generate 5 multiple choice questions about {topic} for MBBS students \
                 preparing for medical licensing exams.\n\n\
                 Format each question as:\n\
                 Q[number]: [Clinical vignette question]\n\
                 A) [Option A]\nB) [Option B]\nC) [Option C]\nD) [Option D]\n\
                 Correct Answer: [Letter]\n\
                 Explanation: [Brief explanation with clinical reasoning]\n\n\
                 Use clinical vignettes with relevant findings, lab values or imaging; \
                 test reasoning rather than recall."
            ),
            features::HIGHYIELD => format!(
                "Produce a high-yield summary of {topic} for rapid revision before a \
                 medical licensing exam. Use short bullet points, mnemonic hooks where \
                 they exist, and flag the most frequently examined facts."
            ),
            features::EXPLAIN => format!(
                "Explain {topic} to a medical student. Start from the underlying \
                 pathophysiology, then clinical presentation, diagnosis and management. \
                 Keep the explanation rigorous but accessible."
            ),
            features::MAP => format!(
                "Create a textual concept map of {topic} for a medical student. Show the \
                 central concept, its major branches (etiology, pathophysiology, clinical \
                 features, investigations, management, complications) and the key links \
                 between them, using indentation to express the hierarchy."
            ),
            _ => return None,
        };
        Some(prompt)
    }

    /// Generate a study artifact for a topic under the given feature.
    #[instrument(skip(self))]
    pub async fn generate(
        &self,
        user_id: &str,
        feature: &str,
        topic: &str,
    ) -> Result<CommandOutput, GatewayError> {
        if topic.trim().is_empty() {
            return Err(GatewayError::InvalidInput("topic is required".to_owned()));
        }
        let prompt = Self::prompt_for(feature, topic)
            .ok_or_else(|| GatewayError::InvalidInput(format!("unknown command: {feature}")))?;

        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("user {user_id}")))?;
        if user.disabled {
            return Err(GatewayError::AccountDisabled);
        }

        if !self.limiter.check(user_id, feature).await {
            return Err(GatewayError::QuotaExceeded {
                usage: self.limiter.remaining(user_id).await,
            });
        }

        let outcome = self
            .router
            .route(
                Some(user_id),
                CompletionRequest::new(feature, prompt)
                    .with_system_prompt(COMMAND_SYSTEM_PROMPT),
            )
            .await?;

        self.limiter
            .increment(user_id, outcome.tokens_used, feature)
            .await;

        Ok(CommandOutput {
            command: feature.to_owned(),
            topic: topic.to_owned(),
            content: outcome.content,
            tokens_used: outcome.tokens_used,
        })
    }
}
