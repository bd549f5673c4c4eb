//! Core abstractions for collaborative coding sessions.
//!
//! This crate provides the fundamental building blocks:
//! - `Session` / `SessionId` - Shared document state and its identifier
//! - `ClientMessage` / `ServerMessage` - Typed wire messages
//! - `ConnectionRegistry` - Per-session membership bookkeeping
//! - `BroadcastEngine` - Fan-out with post-sweep eviction of dead peers
//! - `SessionStore` trait for session state backends

pub mod broadcast;
pub mod connection;
pub mod message;
pub mod registry;
pub mod traits;

pub use broadcast::{BroadcastEngine, BroadcastReport};
pub use connection::{ConnectionHandle, ConnectionId, DeliveryFailure, DeliveryResult};
pub use message::{ClientMessage, Frame, ServerMessage};
pub use registry::ConnectionRegistry;
pub use traits::{Session, SessionError, SessionId, SessionInfo, SessionStore};
