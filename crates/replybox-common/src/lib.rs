//! ReplyBox Common - Shared types and utilities
//!
//! This crate provides the configuration, error and identifier types
//! shared across all ReplyBox components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
