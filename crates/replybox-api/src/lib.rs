//! ReplyBox API - HTTP gateway
//!
//! This crate provides the fetch and reply endpoints, the stored email
//! lookup, health checks, metrics and the OpenAPI document.

pub mod error;
pub mod handlers;
pub mod openapi;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use openapi::create_openapi_routes;
pub use routes::create_router;
pub use state::AppState;
