//! mbg-session: session lifecycle and message handling
//!
//! Owns the session registry, the connection state machine, the per-message
//! moderation pipeline and the command dispatcher.

pub mod command;
pub mod connection;
pub mod error;
pub mod menu;
pub mod moderation;
pub mod registry;
pub mod session;
pub mod welcome;

pub use connection::{DisconnectKind, SessionLauncher, RECONNECT_DELAY, restart_delay};
pub use error::{Error, Result};
pub use registry::SessionRegistry;
pub use session::{LinkPolicy, Session};
