//! Session orchestration and storage for collaborative coding.
//!
//! Provides:
//! - `SessionHub` - Serialized mutate-then-broadcast per session
//! - `Attachment` - A connection's membership, released on drop
//! - Storage implementations (memory)

pub mod attachment;
pub mod hub;
pub mod storage;

pub use attachment::Attachment;
pub use hub::{DEFAULT_OUTBOUND_CAPACITY, MIN_OUTBOUND_CAPACITY, SessionHub};
