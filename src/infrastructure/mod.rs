//! # Infrastructure Layer
//!
//! PostgreSQL-backed implementations of the domain's persistence ports.

pub mod database;
pub mod repositories;
