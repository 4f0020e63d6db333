//! HTTP route handlers, one module per resource.

pub mod account;
pub mod admin;
pub mod auth;
pub mod chat;
pub mod commands;
pub mod documents;
pub mod health;
