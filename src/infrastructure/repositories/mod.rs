//! PostgreSQL repository implementations of the persistence ports.

pub mod ban_repository;
pub mod membership_repository;
pub mod room_repository;
pub mod user_repository;

pub use ban_repository::PgBanRepository;
pub use membership_repository::PgMembershipRepository;
pub use room_repository::PgRoomRepository;
pub use user_repository::PgUserRepository;
