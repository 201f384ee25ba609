//! WebSocket message types
//!
//! Defines the JSON message format of the UI control channel.

use serde::{Deserialize, Serialize};

use mbg_core::{SessionSummary, UiEvent};

/// Message from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Provision a new session and start connecting it
    CreateSession {
        #[serde(skip_serializing_if = "Option::is_none")]
        profile: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        phone: Option<String>,
    },

    /// Request the session inventory
    ListSessions,

    /// Tear down a session and delete its credentials
    DestroySession { folder: String },
}

/// Message from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication challenge for a connecting session
    Qr {
        session_id: String,
        qr_string: String,
    },

    Connected {
        session_id: String,
        folder: String,
    },

    Disconnected {
        session_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<u32>,
    },

    Restarted {
        session_id: String,
        folder: String,
    },

    Reconnected {
        session_id: String,
        folder: String,
    },

    SessionCreated {
        session_id: String,
        folder: String,
    },

    SessionsList { sessions: Vec<SessionSummary> },

    SessionDestroyed { folder: String },

    /// Error notification
    Error { message: String, detail: String },
}

impl From<UiEvent> for ServerMessage {
    fn from(event: UiEvent) -> Self {
        match event {
            UiEvent::Qr {
                session_id,
                qr_string,
            } => Self::Qr {
                session_id,
                qr_string,
            },
            UiEvent::Connected { session_id, folder } => Self::Connected { session_id, folder },
            UiEvent::Disconnected { session_id, reason } => {
                Self::Disconnected { session_id, reason }
            }
            UiEvent::Restarted { session_id, folder } => Self::Restarted { session_id, folder },
            UiEvent::Reconnected { session_id, folder } => Self::Reconnected { session_id, folder },
            UiEvent::SessionCreated { session_id, folder } => {
                Self::SessionCreated { session_id, folder }
            }
            UiEvent::SessionDestroyed { folder } => Self::SessionDestroyed { folder },
            UiEvent::Error { message, detail } => Self::Error { message, detail },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_client_message() {
        let json = r#"{"type":"create_session","profile":"work","phone":"+509 1234"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::CreateSession { profile, name, phone } => {
                assert_eq!(profile.as_deref(), Some("work"));
                assert!(name.is_none());
                assert_eq!(phone.as_deref(), Some("+509 1234"));
            }
            _ => panic!("Wrong message type"),
        }

        let json = r#"{"type":"destroy_session","folder":"auth_info2"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::DestroySession { folder } if folder == "auth_info2"
        ));
    }

    #[test]
    fn test_serialize_server_message() {
        let msg = ServerMessage::Connected {
            session_id: "abc".to_string(),
            folder: "auth_info1".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"connected"#));
        assert!(json.contains(r#""folder":"auth_info1"#));
    }

    #[test]
    fn test_ui_event_mapping() {
        let event = UiEvent::Qr {
            session_id: "abc".to_string(),
            qr_string: "payload".to_string(),
        };
        let msg = ServerMessage::from(event);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"qr"#));
        assert!(json.contains(r#""qr_string":"payload"#));
    }
}
