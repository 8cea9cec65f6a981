//! Repository layer for data access

pub mod emails;

// Re-export concrete repository implementations with simple names
pub use emails::DbEmailRepository as EmailRepository;

// Re-export repository traits
pub use emails::EmailRepository as EmailRepositoryTrait;
