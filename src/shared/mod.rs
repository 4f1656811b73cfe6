//! Shared Utilities
//!
//! Common error types and password hashing used across layers.

pub mod error;
pub mod password;

pub use error::AppError;
