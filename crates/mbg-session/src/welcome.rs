//! Group join announcements

use tracing::warn;

use mbg_core::{Jid, OutgoingMessage, ParticipantAction, Result};

use crate::session::Session;

/// React to a participant-change notification. Only joins are announced,
/// and only in conversations where welcomes were switched on.
pub async fn handle_participants(
    session: &Session,
    group: &Jid,
    action: ParticipantAction,
    participants: &[Jid],
) -> Result<()> {
    if action != ParticipantAction::Add {
        return Ok(());
    }
    if !session.welcome_enabled(group).await {
        return Ok(());
    }

    let subject = match session.transport.group_metadata(group).await {
        Ok(meta) => meta.subject,
        Err(e) => {
            warn!(session = %session.id, group = %group, error = %e, "group metadata unavailable");
            group.as_str().to_string()
        }
    };

    for participant in participants {
        let text = format!("Welcome @{} to {subject}", participant.number());
        session
            .transport
            .send(
                group,
                OutgoingMessage::text_with_mentions(text, vec![participant.clone()]),
            )
            .await?;
    }
    Ok(())
}
