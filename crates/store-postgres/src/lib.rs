//! Postgres backend for the Vaidya storage and audit traits.
//!
//! One [`PgStore`] handle implements every storage trait plus the audit
//! store, backed by a shared `sqlx` pool. Schema migrations are idempotent
//! and run at connection time.

pub mod audit;
pub mod migrations;
pub mod rows;
pub mod store;

pub use store::PgStore;
