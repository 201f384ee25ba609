//! Connection lifecycle
//!
//! The launcher opens connections through the configured [`Connector`],
//! registers the resulting session and drives its event stream on a
//! dedicated task. Disconnects are classified by protocol status code:
//! a logout is terminal, a restart request relaunches with a growing delay
//! and anything else reconnects after a fixed pause.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use mbg_core::credstore::{SessionMeta, now_millis};
use mbg_core::transport::status;
use mbg_core::{Connector, GatewayConfig, SharedMode, TransportEvent, UiEvent, UiSender};

use crate::command;
use crate::error::Result;
use crate::registry::SessionRegistry;
use crate::session::Session;
use crate::welcome;

/// Delay before a plain reconnect attempt
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Delay before relaunching after a protocol-requested restart. Grows with
/// the attempt counter and is capped at 30 seconds.
pub fn restart_delay(attempt: u32) -> Duration {
    Duration::from_millis((2_000 + u64::from(attempt) * 2_000).min(30_000))
}

/// Where a connection is in its lifecycle; informational only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticating,
    Open,
    Closing,
}

/// What a disconnect means for the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectKind {
    /// Credentials invalidated; no relaunch. The credential directory stays
    /// on disk.
    Terminated,
    /// Protocol-requested restart; relaunch with a growing delay
    Restarting,
    /// Anything else; relaunch after the fixed reconnect delay
    Reconnecting,
}

impl DisconnectKind {
    pub fn classify(code: Option<u32>) -> Self {
        match code {
            Some(status::LOGGED_OUT) => Self::Terminated,
            Some(status::RESTART_REQUIRED) => Self::Restarting,
            _ => Self::Reconnecting,
        }
    }
}

/// Opens and supervises session connections.
///
/// Creation is serialized through one lock so a session id is checked,
/// connected and registered as a single step; concurrent launches for the
/// same id converge on one live session.
#[derive(Clone)]
pub struct SessionLauncher {
    registry: SessionRegistry,
    connector: Arc<dyn Connector>,
    config: Arc<GatewayConfig>,
    mode: SharedMode,
    create_lock: Arc<Mutex<()>>,
}

impl SessionLauncher {
    pub fn new(
        registry: SessionRegistry,
        connector: Arc<dyn Connector>,
        config: Arc<GatewayConfig>,
        mode: SharedMode,
    ) -> Self {
        Self {
            registry,
            connector,
            config,
            mode,
            create_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Open (or return) the session for `session_id`, storing credentials
    /// under `folder`
    pub async fn launch(&self, session_id: &str, folder: &str, ui: UiSender) -> Result<Arc<Session>> {
        self.launch_with_attempt(session_id.to_string(), folder.to_string(), ui, 0)
            .await
    }

    async fn launch_with_attempt(
        &self,
        session_id: String,
        folder: String,
        ui: UiSender,
        attempt: u32,
    ) -> Result<Arc<Session>> {
        let _guard = self.create_lock.lock().await;

        if let Some(existing) = self.registry.get(&session_id).await {
            if existing.transport.is_open() {
                debug!(session = %session_id, "session already live");
                return Ok(existing);
            }
            // stale entry from a dead connection
            self.registry.remove(&session_id).await;
        }

        let dir = self.registry.base_dir().join(&folder);
        std::fs::create_dir_all(&dir).map_err(mbg_core::Error::from)?;
        let meta = SessionMeta::load(&dir)?;

        let connection = self.connector.connect(&dir).await?;
        let session = Arc::new(Session::new(
            &session_id,
            &folder,
            dir,
            connection.transport,
            meta.owner_digits(),
        ));
        self.registry.insert(session.clone()).await;
        info!(session = %session_id, folder = %folder, attempt, "session launched");

        let launcher = self.clone();
        let driven = session.clone();
        tokio::spawn(async move {
            launcher.drive(driven, connection.events, ui, attempt).await;
        });

        Ok(session)
    }

    /// Consume the connection's event stream until it closes
    async fn drive(
        self,
        session: Arc<Session>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        ui: UiSender,
        attempt: u32,
    ) {
        let mut state = ConnectionState::Connecting;
        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Qr { code } => {
                    state = transition(&session, state, ConnectionState::Authenticating);
                    let _ = ui.send(UiEvent::Qr {
                        session_id: session.id.clone(),
                        qr_string: code,
                    });
                }
                TransportEvent::Open { account } => {
                    state = transition(&session, state, ConnectionState::Open);
                    session.record_authenticated_account(&account).await;
                    session.set_restarting(false).await;
                    if let Err(e) = record_connect(&session).await {
                        warn!(session = %session.id, error = %e, "failed to update session metadata");
                    }
                    info!(session = %session.id, account = %account, "connection open");
                    let _ = ui.send(UiEvent::Connected {
                        session_id: session.id.clone(),
                        folder: session.folder.clone(),
                    });
                }
                TransportEvent::Closed { status } => {
                    transition(&session, state, ConnectionState::Closing);
                    let _ = ui.send(UiEvent::Disconnected {
                        session_id: session.id.clone(),
                        reason: status,
                    });
                    self.handle_close(session, status, ui, attempt).await;
                    return;
                }
                TransportEvent::Message(msg) => {
                    command::handle_inbound(&self.config, &self.mode, &session, &msg).await;
                }
                TransportEvent::Participants {
                    group,
                    action,
                    participants,
                } => {
                    if let Err(e) =
                        welcome::handle_participants(&session, &group, action, &participants).await
                    {
                        warn!(session = %session.id, group = %group, error = %e, "welcome failed");
                    }
                }
            }
        }

        // the transport dropped its sender without a close event
        debug!(session = %session.id, "event stream ended");
        self.teardown(&session).await;
    }

    /// Stop ghost tasks, close the handle best-effort and drop the
    /// registry entry
    async fn teardown(&self, session: &Session) {
        session.stop_ghosts().await;
        if let Err(e) = session.transport.close().await {
            debug!(session = %session.id, error = %e, "close after disconnect failed");
        }
        self.registry.remove(&session.id).await;
    }

    async fn handle_close(&self, session: Arc<Session>, status: Option<u32>, ui: UiSender, attempt: u32) {
        self.teardown(&session).await;

        match DisconnectKind::classify(status) {
            DisconnectKind::Terminated => {
                info!(session = %session.id, "logged out; credentials retained on disk");
            }
            DisconnectKind::Restarting => {
                session.set_restarting(true).await;
                let delay = restart_delay(attempt);
                info!(
                    session = %session.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "restart required"
                );
                self.clone()
                    .respawn(session, ui, delay, attempt + 1, true);
            }
            DisconnectKind::Reconnecting => {
                info!(session = %session.id, "connection lost, reconnecting");
                self.clone().respawn(session, ui, RECONNECT_DELAY, 0, false);
            }
        }
    }

    /// Relaunch after a delay, reporting the outcome on the UI channel
    fn respawn(self, session: Arc<Session>, ui: UiSender, delay: Duration, attempt: u32, restarted: bool) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let session_id = session.id.clone();
            let folder = session.folder.clone();
            match self
                .launch_with_attempt(session_id.clone(), folder.clone(), ui.clone(), attempt)
                .await
            {
                Ok(_) => {
                    let event = if restarted {
                        UiEvent::Restarted { session_id, folder }
                    } else {
                        UiEvent::Reconnected { session_id, folder }
                    };
                    let _ = ui.send(event);
                }
                Err(e) => {
                    error!(session = %session_id, error = %e, "relaunch failed");
                    let _ = ui.send(UiEvent::Error {
                        message: format!("failed to relaunch session {session_id}"),
                        detail: e.to_string(),
                    });
                }
            }
        });
    }
}

fn transition(session: &Session, from: ConnectionState, to: ConnectionState) -> ConnectionState {
    debug!(session = %session.id, from = ?from, to = ?to, "connection state change");
    to
}

/// Update `meta.json` in place with the connect timestamp and the detected
/// owner
async fn record_connect(session: &Session) -> Result<()> {
    let mut meta = SessionMeta::load(&session.dir)?;
    meta.connected_at = Some(now_millis());
    if meta.owner_phone.is_none() {
        meta.owner_phone = session.owner_phone().await;
    }
    meta.save(&session.dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_disconnect() {
        assert_eq!(DisconnectKind::classify(Some(401)), DisconnectKind::Terminated);
        assert_eq!(DisconnectKind::classify(Some(515)), DisconnectKind::Restarting);
        assert_eq!(DisconnectKind::classify(Some(500)), DisconnectKind::Reconnecting);
        assert_eq!(DisconnectKind::classify(None), DisconnectKind::Reconnecting);
    }

    #[test]
    fn test_restart_delay_grows_and_caps() {
        assert_eq!(restart_delay(0), Duration::from_secs(2));
        assert_eq!(restart_delay(1), Duration::from_secs(4));
        assert_eq!(restart_delay(5), Duration::from_secs(12));
        assert_eq!(restart_delay(14), Duration::from_secs(30));
        // capped from here on
        assert_eq!(restart_delay(100), Duration::from_secs(30));
    }
}
