//! Protocol transport abstraction
//!
//! The underlying chat protocol (connect, authenticate, deliver and receive
//! messages) is an external collaborator. The core talks to it exclusively
//! through the [`Transport`] and [`Connector`] traits; a loopback
//! implementation for development and tests lives in [`memory`].

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::jid::Jid;
use crate::message::{InboundMessage, MessageKey};

pub mod memory;

/// Disconnect status codes with defined state-machine meaning
pub mod status {
    /// Credentials invalidated; the disconnect is terminal.
    pub const LOGGED_OUT: u32 = 401;
    /// The protocol requires a full re-initialization of the connection.
    pub const RESTART_REQUIRED: u32 = 515;
}

/// Outbound message payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingMessage {
    Text { text: String, mentions: Vec<Jid> },
    Contact { display_name: String, vcard: String },
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            mentions: Vec::new(),
        }
    }

    pub fn text_with_mentions(text: impl Into<String>, mentions: Vec<Jid>) -> Self {
        Self::Text {
            text: text.into(),
            mentions,
        }
    }
}

/// Group membership operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantAction {
    Add,
    Remove,
    Promote,
    Demote,
}

/// Who may post in a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSetting {
    AdminsOnly,
    Everyone,
}

/// One group member as reported by the transport
#[derive(Debug, Clone)]
pub struct GroupParticipant {
    pub jid: Jid,
    pub admin: bool,
}

/// Group state as reported by the transport
#[derive(Debug, Clone)]
pub struct GroupMetadata {
    pub id: Jid,
    pub subject: String,
    pub participants: Vec<GroupParticipant>,
}

impl GroupMetadata {
    pub fn is_admin(&self, who: &Jid) -> bool {
        self.participants.iter().any(|p| p.admin && &p.jid == who)
    }

    pub fn member_ids(&self) -> Vec<Jid> {
        self.participants.iter().map(|p| p.jid.clone()).collect()
    }

    pub fn admin_ids(&self) -> Vec<Jid> {
        self.participants
            .iter()
            .filter(|p| p.admin)
            .map(|p| p.jid.clone())
            .collect()
    }
}

/// Event delivered by an open connection
#[derive(Debug)]
pub enum TransportEvent {
    /// Authentication challenge, forwarded verbatim to the UI channel
    Qr { code: String },
    /// Connection authenticated and open; `account` is the authenticated
    /// identity
    Open { account: Jid },
    /// Connection closed with an optional protocol status code
    Closed { status: Option<u32> },
    /// Inbound chat message
    Message(Box<InboundMessage>),
    /// Group membership change
    Participants {
        group: Jid,
        action: ParticipantAction,
        participants: Vec<Jid>,
    },
}

/// Operations an open connection supports.
///
/// Errors are reported per call; a failing operation never invalidates the
/// connection itself (connection loss arrives as a `Closed` event).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, to: &Jid, message: OutgoingMessage) -> Result<()>;

    async fn delete(&self, conversation: &Jid, key: &MessageKey) -> Result<()>;

    async fn group_metadata(&self, group: &Jid) -> Result<GroupMetadata>;

    async fn update_participants(
        &self,
        group: &Jid,
        targets: &[Jid],
        action: ParticipantAction,
    ) -> Result<()>;

    async fn update_setting(&self, group: &Jid, setting: GroupSetting) -> Result<()>;

    async fn update_subject(&self, group: &Jid, subject: &str) -> Result<()>;

    /// Close the connection. Best-effort; callers log and continue on error.
    async fn close(&self) -> Result<()>;

    /// Whether the connection handle is still usable
    fn is_open(&self) -> bool;
}

/// A freshly opened connection: the operation handle plus its event stream
pub struct Connection {
    pub transport: Arc<dyn Transport>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens authenticated connections from per-session credential directories.
///
/// The credential material inside the directory is opaque to the core; a
/// connector that cannot read it reports `Error::CredentialLoad`.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, auth_dir: &Path) -> Result<Connection>;
}
