//! Transport tuning.
//!
//! Outbound queue depth belongs to the hub, which creates each connection's
//! queue; see `SessionHub::with_outbound_capacity`.

/// Default cap on a single inbound WebSocket message (1 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Limits applied to every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Largest inbound message accepted.
    pub max_message_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
        }
    }
}
