//! WebSocket gateway

pub mod handler;

pub use handler::ws_handler;
