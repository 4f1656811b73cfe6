//! # Room Chat
//!
//! Real-time chat core built around three pillars:
//!
//! - a **session registry** mapping user identities to their live
//!   WebSocket connections and room subscription groups,
//! - a **room membership synchronizer** keeping every connection of an
//!   identity consistent with its persisted memberships,
//! - a **moderation-aware broadcast engine** that fans messages out
//!   subject to roles, mutes, bans and block relations.
//!
//! ## Architecture
//!
//! Clean layering: `domain` holds entities and persistence ports,
//! `application` the chat services and wire DTOs, `infrastructure` the
//! PostgreSQL adapters and `presentation` the WebSocket/HTTP transport.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
pub mod shared;
pub mod startup;
pub mod telemetry;
