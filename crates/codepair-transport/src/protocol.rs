//! Wire codec for client-server communication.

use codepair_core::ClientMessage;
use thiserror::Error;

/// Close code sent when a client connects to a session that does not exist.
pub const CLOSE_SESSION_NOT_FOUND: u16 = 4004;

/// Close reason paired with [`CLOSE_SESSION_NOT_FOUND`].
pub const REASON_SESSION_NOT_FOUND: &str = "session not found";

/// Decode error. Never fatal to the connection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Binary frame is not valid UTF-8")]
    InvalidUtf8,
}

/// Decode a text frame.
///
/// Unrecognised `type` values decode to [`ClientMessage::Unknown`].
///
/// # Errors
/// Returns `Malformed` if the frame is not a JSON object with a `type`.
pub fn decode(text: &str) -> Result<ClientMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Decode a binary frame holding UTF-8 JSON.
///
/// # Errors
/// Returns `InvalidUtf8` or `Malformed`.
pub fn decode_binary(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let text = std::str::from_utf8(data).map_err(|_| ProtocolError::InvalidUtf8)?;
    decode(text)
}
