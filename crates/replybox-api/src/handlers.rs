//! API request handlers

pub mod emails;
pub mod health;
pub mod metrics;

pub use health::*;
