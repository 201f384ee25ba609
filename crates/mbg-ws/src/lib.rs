//! mbg-ws: WebSocket UI control channel
//!
//! Real-time bidirectional session control via WebSocket, built with axum.

pub mod error;
pub mod handler;
pub mod message;
pub mod server;

pub use error::{Result, WsError};
pub use handler::websocket_handler;
pub use message::{ClientMessage, ServerMessage};
pub use server::{WsState, start_ws_server};
