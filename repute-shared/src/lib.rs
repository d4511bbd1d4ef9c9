//! # Repute shared library
//!
//! Types and business logic shared by the Repute API server and the
//! reputation worker.
//!
//! ## Module Organization
//!
//! - `models`: database models and queries
//! - `auth`: passwords, JWTs, invite tokens and axum middleware
//! - `db`: connection pool and migrations
//! - `reputation`: score formulas and the recompute service
//! - `events`: push notifications and the notifier seam
//! - `redis`: Redis client and notification streams

pub mod auth;
pub mod db;
pub mod events;
pub mod models;
pub mod redis;
pub mod reputation;

/// Current version of the Repute shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
