//! Core domain types for the Vaidya AI routing and resilience core.
//!
//! Everything here is plain data: plans and roles, credential records and
//! their status machine, daily usage counters and plan limits, maintenance
//! state, user accounts, chat records and documents. Services live in
//! `vaidya-gateway`; storage traits live in `vaidya-store`.

pub mod chat;
pub mod credential;
pub mod document;
pub mod feature;
pub mod flags;
pub mod maintenance;
pub mod plan;
pub mod usage;
pub mod user;

pub use chat::{ChatSession, Citation, Message, MessageRole};
pub use credential::{Credential, CredentialStatus, HealthCheckRecord, FAILURE_THRESHOLD};
pub use document::{
    Document, EmbeddingRow, FileType, ProcessingStatus, SearchHit, EMBEDDING_DIM,
    SUMMARY_CHUNK_INDEX,
};
pub use feature::{features, is_heavy_feature};
pub use flags::{feature_flag_name, parse_feature_enabled, SystemFlag, MAINTENANCE_FLAG};
pub use maintenance::{MaintenanceLevel, MaintenanceState};
pub use plan::{Plan, PlanLimits, Role, UnknownVariant};
pub use usage::{UsageCounter, UsageSnapshot};
pub use user::{AllowlistEntry, User};
