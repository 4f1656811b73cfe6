//! Core domain entities and their repository traits.

pub mod ban;
pub mod membership;
pub mod room;
pub mod user;

pub use ban::{Ban, BanRepository};
pub use membership::{Membership, MembershipRepository, RoomRole};
pub use room::{dm_pair, Room, RoomRepository, RoomType};
pub use user::{PresenceStatus, UserRepository};
