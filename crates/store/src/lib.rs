//! Storage traits for the Vaidya core, plus the in-memory backend.
//!
//! Each trait covers one aggregate (users, credentials, usage counters,
//! flags, health records, chat, documents, blobs). Backends implement all of
//! them on one handle; the gateway services depend only on the trait objects
//! they use. The Postgres backend lives in `vaidya-store-postgres`.

pub mod blob;
pub mod chat;
pub mod credentials;
pub mod documents;
pub mod error;
pub mod flags;
pub mod health;
pub mod memory;
pub mod usage;
pub mod users;

pub use blob::{BlobError, BlobStore, MemoryBlobStore};
pub use chat::ChatStore;
pub use credentials::CredentialStore;
pub use documents::DocumentStore;
pub use error::StoreError;
pub use flags::FlagStore;
pub use health::HealthCheckStore;
pub use memory::MemoryStore;
pub use usage::UsageStore;
pub use users::UserStore;
