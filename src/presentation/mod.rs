//! Presentation Layer
//!
//! Transport adapters: the WebSocket gateway and the thin HTTP surface
//! around it. All chat semantics live in the application layer; this
//! layer only parses frames, dispatches and acknowledges.

pub mod http;
pub mod websocket;
