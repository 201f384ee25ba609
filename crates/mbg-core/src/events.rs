//! Session-to-UI notifications
//!
//! Sessions report lifecycle events to the UI control channel through an
//! unbounded sender; the channel crate maps them onto its wire protocol.

use tokio::sync::mpsc;

/// Notification emitted by a session toward the UI collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Authentication challenge, forwarded verbatim (rendering happens
    /// elsewhere)
    Qr { session_id: String, qr_string: String },
    Connected { session_id: String, folder: String },
    Disconnected {
        session_id: String,
        reason: Option<u32>,
    },
    Restarted { session_id: String, folder: String },
    Reconnected { session_id: String, folder: String },
    SessionCreated { session_id: String, folder: String },
    SessionDestroyed { folder: String },
    Error { message: String, detail: String },
}

/// Sender half used by session tasks
pub type UiSender = mpsc::UnboundedSender<UiEvent>;

/// Receiver half owned by one UI connection
pub type UiReceiver = mpsc::UnboundedReceiver<UiEvent>;
