//! Wacast Storage - Database access layer
//!
//! This crate provides the PostgreSQL-backed persistence for Wacast:
//! campaigns, per-recipient message records, webhook events, and the
//! durable job queue.

pub mod db;
pub mod models;
pub mod repository;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
