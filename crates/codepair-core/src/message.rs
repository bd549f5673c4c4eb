//! Typed messages exchanged with session participants.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::traits::DEFAULT_LANGUAGE;

/// A serialized outbound message, shared between all recipients of a broadcast.
pub type Frame = Arc<str>;

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_owned()
}

/// Message from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Replace the session's code.
    CodeChange {
        #[serde(default)]
        code: String,
    },
    /// Replace the session's language.
    LanguageChange {
        #[serde(default = "default_language")]
        language: String,
    },
    /// Cursor movement, relayed and never stored.
    CursorPosition {
        #[serde(default)]
        user_id: Value,
        #[serde(default)]
        position: Value,
    },
    /// Any other `type`; ignored.
    #[serde(other)]
    Unknown,
}

/// Message from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Snapshot sent to a newly attached connection.
    Init { code: String, language: String },
    /// Current number of attached connections.
    Participants { count: usize },
    /// Code replaced by another participant.
    CodeChange { code: String },
    /// Language replaced by another participant.
    LanguageChange { language: String },
    /// Another participant's cursor.
    CursorPosition { user_id: Value, position: Value },
}

impl ServerMessage {
    /// Wire name of the message type, for logging.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Init { .. } => "init",
            Self::Participants { .. } => "participants",
            Self::CodeChange { .. } => "code_change",
            Self::LanguageChange { .. } => "language_change",
            Self::CursorPosition { .. } => "cursor_position",
        }
    }

    /// Serialize into a shareable frame.
    ///
    /// # Errors
    /// Returns error if JSON serialization fails.
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::from)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "code_change", "code": "x=1"})).unwrap();
        assert_eq!(msg, ClientMessage::CodeChange { code: "x=1".into() });

        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "language_change", "language": "rust"}))
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::LanguageChange {
                language: "rust".into()
            }
        );
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let msg: ClientMessage = serde_json::from_value(json!({"type": "code_change"})).unwrap();
        assert_eq!(msg, ClientMessage::CodeChange { code: String::new() });

        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "language_change"})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::LanguageChange {
                language: "python".into()
            }
        );

        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "cursor_position"})).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CursorPosition {
                user_id: Value::Null,
                position: Value::Null
            }
        );
    }

    #[test]
    fn test_unknown_type_is_ignored_variant() {
        let msg: ClientMessage =
            serde_json::from_value(json!({"type": "run_code", "code": "print(1)"})).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
    }

    #[test]
    fn test_missing_type_is_rejected() {
        assert!(serde_json::from_value::<ClientMessage>(json!({"code": "x"})).is_err());
        assert!(serde_json::from_value::<ClientMessage>(json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_server_message_wire_shape() {
        let frame = ServerMessage::Participants { count: 2 }.to_frame().unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value, json!({"type": "participants", "count": 2}));

        let msg = ServerMessage::CursorPosition {
            user_id: json!("alice"),
            position: json!({"line": 3, "ch": 14}),
        };
        assert_eq!(msg.kind(), "cursor_position");
        let value: Value = serde_json::from_str(&msg.to_frame().unwrap()).unwrap();
        assert_eq!(value["position"]["line"], 3);
        assert_eq!(value["user_id"], "alice");
    }
}
