//! Transport layer for collaborative coding sessions.
//!
//! Provides:
//! - Wire codec and close codes (`protocol`)
//! - Runtime tuning (`config`)
//! - WebSocket connection loop (feature: websocket)
//! - HTTP session lifecycle routes (feature: websocket)

pub mod config;
pub mod protocol;

#[cfg(feature = "websocket")]
pub mod api;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use config::TransportConfig;
pub use protocol::ProtocolError;

#[cfg(feature = "websocket")]
pub use websocket::router;
