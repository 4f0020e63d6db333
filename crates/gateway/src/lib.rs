//! The Vaidya routing and resilience core.
//!
//! Services here compose the storage traits, crypto, provider adapter,
//! embedder and notifier into the request path:
//!
//! request -> [`FeatureGate`] -> [`MaintenanceController`] -> [`RateLimiter`]
//! -> retrieval ([`DocumentPipeline`]) -> [`ModelRouter`] -> adapter ->
//! counter increment -> response.
//!
//! The [`HealthMonitor`] runs beside the request path as a single supervised
//! background task. Every service takes its collaborators by `Arc` at
//! construction; nothing is a process-global.

pub mod accounts;
pub mod admin;
pub mod chat;
pub mod commands;
pub mod credentials;
pub mod documents;
pub mod error;
pub mod features;
pub mod health;
pub mod maintenance;
pub mod quota;
pub mod router;

pub use accounts::AccountService;
pub use admin::{AdminIdentity, AdminService, KeyTestResult};
pub use chat::ChatService;
pub use commands::{CommandOutput, CommandService};
pub use credentials::{ActiveKey, CredentialService, MIN_SECRET_LEN};
pub use documents::{chunk_text, DocumentPipeline};
pub use error::GatewayError;
pub use features::FeatureGate;
pub use health::{CycleSummary, HealthMonitor, DEFAULT_INTERVAL};
pub use maintenance::{MaintenanceController, RouteClass};
pub use quota::RateLimiter;
pub use router::{ModelRouter, RouteAttempt, RouteOutcome, DEFAULT_MAX_RETRIES, DEFAULT_PROVIDER};
