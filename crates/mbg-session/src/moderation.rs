//! Per-message moderation pipeline
//!
//! Runs once per inbound message, before command parsing, in a fixed order:
//! status-broadcast filter, private-mode gate, link enforcement, ghost-mode
//! suppression. The outcome is a transient [`Decision`]; the caller applies
//! it.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use mbg_core::jid::phone_digits;
use mbg_core::{AccessMode, GatewayConfig, InboundMessage, Jid, MediaKind, SharedMode, Transport};

use crate::session::{LinkPolicy, Session};

/// Fixed low-visibility reply sent while ghost mode is active
pub const GHOST_PLACEHOLDER: &str = "\u{3164}   ";

/// Generic URLs plus known sharing-link domains
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://|www\.|chat\.whatsapp\.com|wa\.me/|t\.me/").unwrap()
});

/// Why a message was suppressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    StatusBroadcast,
    PrivateMode,
    GhostMode,
}

/// Outcome of the moderation pipeline for one message. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Pass the message on to command dispatch
    Allow,
    /// Drop the message; ghost-mode suppression also produces the fixed
    /// placeholder reply
    Suppress(SuppressReason),
    /// Delete the message from the conversation and stop processing
    Delete,
}

/// Whether any text field matches the link pattern
pub fn contains_link(text: &str) -> bool {
    LINK_RE.is_match(text)
}

/// Group-admin check via transport metadata; transport failures count as
/// "not an admin"
pub async fn is_group_admin(transport: &dyn Transport, group: &Jid, who: &Jid) -> bool {
    match transport.group_metadata(group).await {
        Ok(meta) => meta.is_admin(who),
        Err(e) => {
            debug!(group = %group, error = %e, "group metadata unavailable");
            false
        }
    }
}

/// Evaluate the pipeline for one inbound message
pub async fn evaluate(
    config: &GatewayConfig,
    mode: &SharedMode,
    session: &Session,
    msg: &InboundMessage,
) -> Decision {
    let conversation = &msg.key.conversation;

    // 1. status/broadcast messages are dropped unconditionally
    if conversation.is_status_broadcast() {
        return Decision::Suppress(SuppressReason::StatusBroadcast);
    }

    // 2. private-mode gate: only the global owner and the session's owning
    //    account are served; everyone else is dropped without a reply
    if mode.get().await == AccessMode::Private {
        let sender_number = phone_digits(msg.sender().number());
        if !session.is_owner(&sender_number, config).await {
            return Decision::Suppress(SuppressReason::PrivateMode);
        }
    }

    // 3. link enforcement, group conversations only
    if conversation.is_group() && !msg.key.from_me {
        let policy = session.link_policy(conversation).await;
        if policy != LinkPolicy::Off && msg.text_fields().iter().any(|t| contains_link(t)) {
            // caption-carried links on images are never deleted
            let exempt = msg.content.media() == Some(MediaKind::Image);
            if !exempt {
                match policy {
                    LinkPolicy::All => return Decision::Delete,
                    LinkPolicy::ExceptAdmins => {
                        let sender = msg.sender();
                        let sender_number = phone_digits(sender.number());
                        let is_admin =
                            is_group_admin(session.transport.as_ref(), conversation, sender).await;
                        if !is_admin && !session.is_owner(&sender_number, config).await {
                            return Decision::Delete;
                        }
                    }
                    LinkPolicy::Off => {}
                }
            }
        }
    }

    // 4. ghost-mode suppression
    if session.ghost_active(conversation).await {
        return Decision::Suppress(SuppressReason::GhostMode);
    }

    Decision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use mbg_core::message::{MessageContent, MessageContext};
    use mbg_core::transport::memory::MemoryTransport;
    use mbg_core::{GroupMetadata, GroupParticipant};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn setup() -> (Session, Arc<MemoryTransport>, GatewayConfig, SharedMode) {
        let (transport, _events) = MemoryTransport::new();
        let session = Session::new(
            "sid",
            "auth_info1",
            PathBuf::from("/tmp/none"),
            transport.clone(),
            None,
        );
        let config = GatewayConfig {
            owner_number: "999".to_string(),
            ..Default::default()
        };
        (session, transport, config, SharedMode::default())
    }

    fn group() -> Jid {
        Jid::new("1203@g.us")
    }

    fn group_with_admin(transport: &MemoryTransport, admin: &Jid, member: &Jid) {
        transport.set_group(GroupMetadata {
            id: group(),
            subject: "Test Group".to_string(),
            participants: vec![
                GroupParticipant {
                    jid: admin.clone(),
                    admin: true,
                },
                GroupParticipant {
                    jid: member.clone(),
                    admin: false,
                },
            ],
        });
    }

    #[test]
    fn test_link_pattern() {
        assert!(contains_link("check https://chat.whatsapp.com/ABC"));
        assert!(contains_link("WWW.example.com"));
        assert!(contains_link("join wa.me/12345"));
        assert!(!contains_link("no links here"));
    }

    #[tokio::test]
    async fn test_status_broadcast_dropped() {
        let (session, _, config, mode) = setup();
        let msg = InboundMessage::plain("status@broadcast", None, "m1", "anything");

        let decision = evaluate(&config, &mode, &session, &msg).await;
        assert_eq!(decision, Decision::Suppress(SuppressReason::StatusBroadcast));
    }

    #[tokio::test]
    async fn test_private_mode_gate() {
        let (session, _, config, mode) = setup();
        mode.set(AccessMode::Private).await;

        let stranger = InboundMessage::plain("123@s.whatsapp.net", None, "m1", ".menu");
        assert_eq!(
            evaluate(&config, &mode, &session, &stranger).await,
            Decision::Suppress(SuppressReason::PrivateMode)
        );

        let owner = InboundMessage::plain("999@s.whatsapp.net", None, "m2", ".menu");
        assert_eq!(evaluate(&config, &mode, &session, &owner).await, Decision::Allow);
    }

    #[tokio::test]
    async fn test_policy_all_deletes_regardless_of_role() {
        let (session, transport, config, mode) = setup();
        let admin = Jid::new("555@s.whatsapp.net");
        let member = Jid::new("666@s.whatsapp.net");
        group_with_admin(&transport, &admin, &member);
        session.set_link_policy(&group(), LinkPolicy::All).await;

        let msg = InboundMessage::plain(group(), Some(admin), "m1", "https://x.test");
        assert_eq!(evaluate(&config, &mode, &session, &msg).await, Decision::Delete);
    }

    #[tokio::test]
    async fn test_policy_except_admins_retains_admin_links() {
        let (session, transport, config, mode) = setup();
        let admin = Jid::new("555@s.whatsapp.net");
        let member = Jid::new("666@s.whatsapp.net");
        group_with_admin(&transport, &admin, &member);
        session.set_link_policy(&group(), LinkPolicy::ExceptAdmins).await;

        let text = "check this https://chat.whatsapp.com/ABC";
        let from_member = InboundMessage::plain(group(), Some(member), "m1", text);
        assert_eq!(
            evaluate(&config, &mode, &session, &from_member).await,
            Decision::Delete
        );

        let from_admin = InboundMessage::plain(group(), Some(admin), "m2", text);
        assert_eq!(
            evaluate(&config, &mode, &session, &from_admin).await,
            Decision::Allow
        );
    }

    #[tokio::test]
    async fn test_own_messages_never_deleted() {
        let (session, _, config, mode) = setup();
        session.set_link_policy(&group(), LinkPolicy::All).await;

        let msg =
            InboundMessage::plain(group(), None, "m1", "https://chat.whatsapp.com/X").from_me();
        assert_eq!(evaluate(&config, &mode, &session, &msg).await, Decision::Allow);
    }

    #[tokio::test]
    async fn test_image_caption_links_exempt() {
        let (session, _, config, mode) = setup();
        session.set_link_policy(&group(), LinkPolicy::All).await;

        let mut msg = InboundMessage::plain(group(), Some(Jid::new("666@s.whatsapp.net")), "m1", "");
        msg.content = MessageContent::Caption {
            media: MediaKind::Image,
            caption: "see https://example.com".to_string(),
            context: None,
        };
        assert_eq!(evaluate(&config, &mode, &session, &msg).await, Decision::Allow);
    }

    #[tokio::test]
    async fn test_quoted_text_counts_as_text_field() {
        let (session, transport, config, mode) = setup();
        let admin = Jid::new("555@s.whatsapp.net");
        let member = Jid::new("666@s.whatsapp.net");
        group_with_admin(&transport, &admin, &member);
        session.set_link_policy(&group(), LinkPolicy::All).await;

        let mut msg = InboundMessage::plain(group(), Some(member), "m1", "");
        msg.content = MessageContent::Reply {
            text: "look at this".to_string(),
            context: MessageContext {
                quoted_text: Some("https://spam.example".to_string()),
                ..Default::default()
            },
        };
        assert_eq!(evaluate(&config, &mode, &session, &msg).await, Decision::Delete);
    }

    #[tokio::test]
    async fn test_ghost_mode_suppresses() {
        let (session, _, config, mode) = setup();
        session.toggle_ghost(&group()).await;

        let msg = InboundMessage::plain(group(), Some(Jid::new("666@s.whatsapp.net")), "m1", "hi");
        assert_eq!(
            evaluate(&config, &mode, &session, &msg).await,
            Decision::Suppress(SuppressReason::GhostMode)
        );
        session.stop_ghosts().await;
    }

    #[tokio::test]
    async fn test_plain_message_allowed() {
        let (session, _, config, mode) = setup();
        let msg = InboundMessage::plain("123@s.whatsapp.net", None, "m1", "hello");
        assert_eq!(evaluate(&config, &mode, &session, &msg).await, Decision::Allow);
    }
}
