use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::feature::features;

/// Daily usage counters for one user, keyed by `(user_id, date)`.
///
/// Values increase monotonically within a day; the implicit reset is a new
/// row on the first request of the next day. Counters are best-effort, not a
/// transactional ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounter {
    pub user_id: String,
    /// Calendar date in the server timezone.
    pub date: NaiveDate,
    pub tokens_used: u64,
    pub requests_count: u64,
    pub pdf_uploads: u64,
    pub mcqs_generated: u64,
    pub images_used: u64,
    pub flashcards_generated: u64,
}

impl UsageCounter {
    /// A zeroed counter for the given user and date.
    #[must_use]
    pub fn empty(user_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            date,
            tokens_used: 0,
            requests_count: 0,
            pdf_uploads: 0,
            mcqs_generated: 0,
            images_used: 0,
            flashcards_generated: 0,
        }
    }

    /// Apply one successful generation: add tokens, count the request, and
    /// bump the feature-specific counter if the feature maps to one.
    pub fn apply(&mut self, tokens: u64, feature: &str) {
        self.tokens_used = self.tokens_used.saturating_add(tokens);
        self.requests_count = self.requests_count.saturating_add(1);
        if let Some(counter) = self.feature_counter_mut(feature) {
            *counter += 1;
        }
    }

    /// The feature-specific counter for a feature tag, if one exists.
    ///
    /// Map: `document_upload -> pdf_uploads`, `mcq -> mcqs_generated`,
    /// `image -> images_used`, `flashcard -> flashcards_generated`. Other
    /// features touch only the global counters.
    #[must_use]
    pub fn feature_counter(&self, feature: &str) -> Option<u64> {
        match feature {
            features::DOCUMENT_UPLOAD => Some(self.pdf_uploads),
            features::MCQ => Some(self.mcqs_generated),
            features::IMAGE => Some(self.images_used),
            features::FLASHCARD => Some(self.flashcards_generated),
            _ => None,
        }
    }

    fn feature_counter_mut(&mut self, feature: &str) -> Option<&mut u64> {
        match feature {
            features::DOCUMENT_UPLOAD => Some(&mut self.pdf_uploads),
            features::MCQ => Some(&mut self.mcqs_generated),
            features::IMAGE => Some(&mut self.images_used),
            features::FLASHCARD => Some(&mut self.flashcards_generated),
            _ => None,
        }
    }
}

/// Client-facing view of today's usage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub tokens_used: u64,
    pub requests_count: u64,
    pub pdf_uploads: u64,
    pub mcqs_generated: u64,
    pub images_used: u64,
    pub flashcards_generated: u64,
}

impl From<&UsageCounter> for UsageSnapshot {
    fn from(counter: &UsageCounter) -> Self {
        Self {
            tokens_used: counter.tokens_used,
            requests_count: counter.requests_count,
            pdf_uploads: counter.pdf_uploads,
            mcqs_generated: counter.mcqs_generated,
            images_used: counter.images_used,
            flashcards_generated: counter.flashcards_generated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> UsageCounter {
        UsageCounter::empty("u1", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
    }

    #[test]
    fn apply_bumps_global_counters() {
        let mut c = counter();
        c.apply(150, "chat");
        assert_eq!(c.tokens_used, 150);
        assert_eq!(c.requests_count, 1);
        assert_eq!(c.mcqs_generated, 0);
    }

    #[test]
    fn apply_bumps_feature_counter() {
        let mut c = counter();
        c.apply(80, features::MCQ);
        c.apply(90, features::MCQ);
        assert_eq!(c.mcqs_generated, 2);
        assert_eq!(c.requests_count, 2);
        assert_eq!(c.tokens_used, 170);
    }

    #[test]
    fn feature_counter_map() {
        let mut c = counter();
        c.apply(0, features::DOCUMENT_UPLOAD);
        c.apply(0, features::IMAGE);
        c.apply(0, features::FLASHCARD);
        assert_eq!(c.pdf_uploads, 1);
        assert_eq!(c.images_used, 1);
        assert_eq!(c.flashcards_generated, 1);
        assert_eq!(c.feature_counter("explain"), None);
    }

    #[test]
    fn snapshot_mirrors_counter() {
        let mut c = counter();
        c.apply(42, features::FLASHCARD);
        let snap = UsageSnapshot::from(&c);
        assert_eq!(snap.tokens_used, 42);
        assert_eq!(snap.flashcards_generated, 1);
    }
}
