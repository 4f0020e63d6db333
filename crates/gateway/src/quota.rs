use std::sync::Arc;

use chrono::Local;
use tracing::{instrument, warn};

use vaidya_core::{UsageCounter, UsageSnapshot};
use vaidya_store::{FlagStore, UsageStore, UserStore};

use crate::error::GatewayError;

/// Admits or rejects requests against the caller's plan caps and increments
/// counters after successful downstream calls.
///
/// Counters are keyed by the server-local calendar date; the daily reset is
/// implicit in the key. Admission is best-effort under concurrency: two
/// requests may both observe the pre-increment count, and small overcounts
/// past a cap are acceptable.
#[derive(Clone)]
pub struct RateLimiter {
    users: Arc<dyn UserStore>,
    usage: Arc<dyn UsageStore>,
    flags: Arc<dyn FlagStore>,
}

impl RateLimiter {
    /// Build the limiter.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        usage: Arc<dyn UsageStore>,
        flags: Arc<dyn FlagStore>,
    ) -> Self {
        Self { users, usage, flags }
    }

    /// Whether the user may issue one more request for `feature`.
    ///
    /// Admin-like roles bypass every check. Storage errors fail closed: a
    /// user we cannot verify is not admitted.
    #[instrument(skip(self))]
    pub async fn check(&self, user_id: &str, feature: &str) -> bool {
        let user = match self.users.get_user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return false,
            Err(e) => {
                warn!(user_id, error = %e, "rate limit check failed closed");
                return false;
            }
        };

        if user.bypasses_quota() {
            return true;
        }

        let limits = user.plan.limits();
        let usage = self.today(user_id).await;

        if usage.tokens_used >= limits.daily_tokens {
            return false;
        }
        if usage.requests_count >= limits.daily_requests {
            return false;
        }

        if let Some(used) = usage.feature_counter(feature) {
            let cap = self.feature_cap(feature, &limits).await;
            if used >= cap {
                return false;
            }
        }

        true
    }

    /// The cap for a feature counter: a `feature_limit_<feature>` flag when
    /// an operator has set a parsable one, otherwise the plan's static cap.
    async fn feature_cap(&self, feature: &str, limits: &vaidya_core::PlanLimits) -> u64 {
        let static_cap = match feature {
            vaidya_core::features::DOCUMENT_UPLOAD => limits.pdf_uploads,
            vaidya_core::features::MCQ => limits.mcqs_per_day,
            vaidya_core::features::IMAGE => limits.images_per_day,
            vaidya_core::features::FLASHCARD => limits.flashcards_per_day,
            _ => return u64::MAX,
        };

        match self.flags.get_flag(&format!("feature_limit_{feature}")).await {
            Ok(Some(flag)) => flag.value.trim().parse().unwrap_or(static_cap),
            Ok(None) => static_cap,
            Err(e) => {
                warn!(feature, error = %e, "feature limit flag read failed; using plan cap");
                static_cap
            }
        }
    }

    /// Record one successful generation. Storage errors are logged and
    /// swallowed: the generation already happened, the user's request must
    /// not fail retroactively. The write runs on its own task so a client
    /// disconnect mid-response cannot cancel it.
    #[instrument(skip(self))]
    pub async fn increment(&self, user_id: &str, tokens: u64, feature: &str) {
        let usage = self.usage.clone();
        let user_id = user_id.to_owned();
        let feature = feature.to_owned();
        let today = Local::now().date_naive();
        let write = tokio::spawn(async move {
            if let Err(e) = usage.apply_usage(&user_id, today, tokens, &feature).await {
                warn!(user_id, tokens, feature, error = %e, "usage increment failed");
            }
        });
        let _ = write.await;
    }

    /// Today's counters for client display. Returns zeroes when no row
    /// exists yet or the read fails.
    pub async fn remaining(&self, user_id: &str) -> UsageSnapshot {
        UsageSnapshot::from(&self.today(user_id).await)
    }

    /// Zero a user's counters for a date (admin reset).
    pub async fn reset(&self, user_id: &str, date: chrono::NaiveDate) -> Result<(), GatewayError> {
        Ok(self.usage.reset_usage(user_id, date).await?)
    }

    async fn today(&self, user_id: &str) -> UsageCounter {
        let today = Local::now().date_naive();
        match self.usage.get_usage(user_id, today).await {
            Ok(Some(counter)) => counter,
            Ok(None) => UsageCounter::empty(user_id, today),
            Err(e) => {
                warn!(user_id, error = %e, "usage read failed; reporting zeroes");
                UsageCounter::empty(user_id, today)
            }
        }
    }
}
