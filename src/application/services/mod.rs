//! Application services: the chat core.
//!
//! - **session_registry**: identity → live connections, room groups
//! - **room_sync**: bulk join/leave across a connection set + persisted rows
//! - **moderation**: roles, mutes, bans, passwords (per-room serialization)
//! - **broadcast**: the single fan-out point
//! - **dm**: 1:1 room resolution
//! - **presence**: status transitions

pub mod broadcast;
pub mod dm;
pub mod moderation;
pub mod presence;
pub mod room_sync;
pub mod session_registry;

pub use broadcast::{BroadcastRouter, Delivery};
pub use dm::{DmOutcome, DmService};
pub use moderation::ModerationService;
pub use presence::PresenceService;
pub use room_sync::RoomSyncService;
pub use session_registry::{Connection, SessionRegistry};
