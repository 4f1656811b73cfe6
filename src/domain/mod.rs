//! # Domain Layer
//!
//! Core entities of the chat subsystem and the persistence ports it
//! consumes. Rooms, memberships and bans are owned by the persistence
//! service behind these traits; users are referenced, never owned.
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define the data access contracts
//! - Entities encapsulate domain behavior (role authority, lazy mute expiry)

pub mod entities;

// Re-export commonly used types
pub use entities::*;
