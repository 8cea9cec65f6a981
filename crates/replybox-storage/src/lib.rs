//! ReplyBox Storage - Database access layer
//!
//! This crate owns the PostgreSQL pool, the migrations, the row models and
//! the email repository.

pub mod db;
pub mod models;
pub mod repository;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use db::DatabasePool;
pub use models::*;
pub use repository::*;
