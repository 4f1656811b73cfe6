//! # Application Layer
//!
//! The chat core's services and the wire DTOs they exchange with the
//! transport edge.

pub mod dto;
pub mod services;
