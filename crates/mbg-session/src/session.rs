//! Per-session state
//!
//! A `Session` owns exactly one connection handle plus the mutable policy
//! state the moderation pipeline and command dispatcher consult: link
//! policies, welcome flags and ghost-mode task handles, all keyed by
//! conversation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::debug;

use mbg_core::jid::phone_digits;
use mbg_core::{GatewayConfig, Jid, OutgoingMessage, Transport};

use crate::moderation::GHOST_PLACEHOLDER;

/// Interval between ghost-mode placeholder sends
const GHOST_PERIOD: Duration = Duration::from_secs(1);

/// Automatic link-deletion policy for one conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkPolicy {
    /// No enforcement
    #[default]
    Off,
    /// Delete link messages unless the sender is a group admin or owner
    ExceptAdmins,
    /// Delete link messages regardless of sender role
    All,
}

#[derive(Default)]
struct SessionState {
    /// Owning account number (preconfigured or detected at connect)
    owner_phone: Option<String>,
    /// The authenticated identity of this session's own account
    bot_id: Option<Jid>,
    /// True only during a reconnect-in-progress window
    restarting: bool,
    link_policy: HashMap<Jid, LinkPolicy>,
    welcome_enabled: HashMap<Jid, bool>,
    /// At most one ghost task per conversation; aborted on toggle-off and
    /// on teardown
    ghost_tasks: HashMap<Jid, JoinHandle<()>>,
}

/// One authenticated connection instance and its policy state
pub struct Session {
    pub id: String,
    pub folder: String,
    pub dir: PathBuf,
    /// Exclusively owned connection handle; never shared across sessions
    pub transport: Arc<dyn Transport>,
    state: RwLock<SessionState>,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        folder: impl Into<String>,
        dir: PathBuf,
        transport: Arc<dyn Transport>,
        owner_phone: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            folder: folder.into(),
            dir,
            transport,
            state: RwLock::new(SessionState {
                owner_phone,
                ..Default::default()
            }),
        }
    }

    pub async fn owner_phone(&self) -> Option<String> {
        self.state.read().await.owner_phone.clone()
    }

    /// Record the account that authenticated this session. Keeps a
    /// preconfigured owner if one is already set.
    pub async fn record_authenticated_account(&self, account: &Jid) {
        let mut state = self.state.write().await;
        state.bot_id = Some(account.clone());
        if state.owner_phone.is_none() {
            let digits = phone_digits(account.number());
            if !digits.is_empty() {
                debug!(session = %self.id, owner = %digits, "detected session owner");
                state.owner_phone = Some(digits);
            }
        }
    }

    pub async fn bot_id(&self) -> Option<Jid> {
        self.state.read().await.bot_id.clone()
    }

    pub async fn restarting(&self) -> bool {
        self.state.read().await.restarting
    }

    pub async fn set_restarting(&self, restarting: bool) {
        self.state.write().await.restarting = restarting;
    }

    /// Whether `number` (digits-only) is the global owner or this session's
    /// owning account
    pub async fn is_owner(&self, number: &str, config: &GatewayConfig) -> bool {
        if config.is_global_owner(number) {
            return true;
        }
        match &self.state.read().await.owner_phone {
            Some(owner) => number == owner,
            // no owner detected yet: fall back to the global owner only
            None => false,
        }
    }

    pub async fn link_policy(&self, conversation: &Jid) -> LinkPolicy {
        self.state
            .read()
            .await
            .link_policy
            .get(conversation)
            .copied()
            .unwrap_or_default()
    }

    pub async fn set_link_policy(&self, conversation: &Jid, policy: LinkPolicy) {
        self.state
            .write()
            .await
            .link_policy
            .insert(conversation.clone(), policy);
    }

    pub async fn welcome_enabled(&self, conversation: &Jid) -> bool {
        self.state
            .read()
            .await
            .welcome_enabled
            .get(conversation)
            .copied()
            .unwrap_or(false)
    }

    pub async fn set_welcome(&self, conversation: &Jid, enabled: bool) {
        self.state
            .write()
            .await
            .welcome_enabled
            .insert(conversation.clone(), enabled);
    }

    pub async fn ghost_active(&self, conversation: &Jid) -> bool {
        self.state.read().await.ghost_tasks.contains_key(conversation)
    }

    /// Flip ghost mode for a conversation: stop the task if one is active,
    /// start one otherwise. Returns the new state (true = active). The stop
    /// is synchronous with the toggle; two tasks can never run concurrently
    /// for the same conversation because the write lock is held across the
    /// flip.
    pub async fn toggle_ghost(&self, conversation: &Jid) -> bool {
        let mut state = self.state.write().await;
        if let Some(task) = state.ghost_tasks.remove(conversation) {
            task.abort();
            debug!(session = %self.id, conversation = %conversation, "ghost mode off");
            return false;
        }

        let transport = self.transport.clone();
        let convo = conversation.clone();
        let task = tokio::spawn(async move {
            loop {
                if transport
                    .send(&convo, OutgoingMessage::text(GHOST_PLACEHOLDER))
                    .await
                    .is_err()
                {
                    break;
                }
                tokio::time::sleep(GHOST_PERIOD).await;
            }
        });
        state.ghost_tasks.insert(conversation.clone(), task);
        debug!(session = %self.id, conversation = %conversation, "ghost mode on");
        true
    }

    /// Abort every ghost task; called on teardown
    pub async fn stop_ghosts(&self) {
        let mut state = self.state.write().await;
        for (_, task) in state.ghost_tasks.drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbg_core::transport::memory::MemoryTransport;

    fn test_session() -> (Session, Arc<MemoryTransport>) {
        let (transport, _events) = MemoryTransport::new();
        let session = Session::new(
            "sid",
            "auth_info1",
            PathBuf::from("/tmp/none"),
            transport.clone(),
            None,
        );
        (session, transport)
    }

    #[tokio::test]
    async fn test_link_policy_defaults_off() {
        let (session, _) = test_session();
        let group = Jid::new("1@g.us");
        assert_eq!(session.link_policy(&group).await, LinkPolicy::Off);

        session.set_link_policy(&group, LinkPolicy::All).await;
        assert_eq!(session.link_policy(&group).await, LinkPolicy::All);
        // other conversations unaffected
        assert_eq!(session.link_policy(&Jid::new("2@g.us")).await, LinkPolicy::Off);
    }

    #[tokio::test]
    async fn test_owner_detection_is_sticky_per_connection() {
        let (session, _) = test_session();
        assert!(session.owner_phone().await.is_none());

        let account = Jid::new("50912345678@s.whatsapp.net");
        session.record_authenticated_account(&account).await;
        assert_eq!(session.owner_phone().await.as_deref(), Some("50912345678"));
        assert_eq!(session.bot_id().await, Some(account));
    }

    #[tokio::test]
    async fn test_preconfigured_owner_survives_authentication() {
        let (transport, _events) = MemoryTransport::new();
        let session = Session::new(
            "sid",
            "auth_info1",
            PathBuf::from("/tmp/none"),
            transport,
            Some("111".to_string()),
        );

        session
            .record_authenticated_account(&Jid::new("222@s.whatsapp.net"))
            .await;
        assert_eq!(session.owner_phone().await.as_deref(), Some("111"));
        assert_eq!(session.bot_id().await, Some(Jid::new("222@s.whatsapp.net")));

        let config = GatewayConfig::default();
        assert!(session.is_owner("111", &config).await);
    }

    #[tokio::test]
    async fn test_is_owner_checks_global_and_session() {
        let (session, _) = test_session();
        let config = GatewayConfig {
            owner_number: "111".to_string(),
            ..Default::default()
        };

        assert!(session.is_owner("111", &config).await);
        assert!(!session.is_owner("222", &config).await);

        session
            .record_authenticated_account(&Jid::new("222@s.whatsapp.net"))
            .await;
        assert!(session.is_owner("222", &config).await);
    }

    #[tokio::test]
    async fn test_ghost_toggle_is_a_flip() {
        let (session, _) = test_session();
        let group = Jid::new("1@g.us");

        assert!(session.toggle_ghost(&group).await);
        assert!(session.ghost_active(&group).await);

        assert!(!session.toggle_ghost(&group).await);
        assert!(!session.ghost_active(&group).await);
    }

    #[tokio::test]
    async fn test_stop_ghosts_clears_all() {
        let (session, _) = test_session();
        session.toggle_ghost(&Jid::new("1@g.us")).await;
        session.toggle_ghost(&Jid::new("2@g.us")).await;

        session.stop_ghosts().await;
        assert!(!session.ghost_active(&Jid::new("1@g.us")).await);
        assert!(!session.ghost_active(&Jid::new("2@g.us")).await);
    }
}
