//! Configuration management.

pub mod settings;

pub use settings::{
    CorsSettings, DatabaseSettings, JwtSettings, ServerSettings, Settings, WebSocketSettings,
};
