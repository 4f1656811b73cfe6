//! Data transfer objects for the gateway wire protocol.

pub mod events;

pub use events::*;
