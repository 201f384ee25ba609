//! mbg-core: shared types for the messaging-bot gateway
//!
//! Configuration, error handling, identities, the inbound message model,
//! the transport abstraction and the per-session credential metadata store.

pub mod config;
pub mod credstore;
pub mod error;
pub mod events;
pub mod jid;
pub mod message;
pub mod transport;

pub use config::{AccessMode, GatewayConfig, SharedMode};
pub use credstore::{SessionMeta, SessionSummary};
pub use error::{Error, Result};
pub use events::{UiEvent, UiReceiver, UiSender};
pub use jid::Jid;
pub use message::{InboundMessage, MediaKind, MessageContent, MessageContext, MessageKey};
pub use transport::{
    Connection, Connector, GroupMetadata, GroupParticipant, GroupSetting, OutgoingMessage,
    ParticipantAction, Transport, TransportEvent,
};
