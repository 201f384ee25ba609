//! Command dispatcher
//!
//! Parses a command token and arguments from message text, resolves target
//! identities, checks authorization and maps the command onto transport
//! operations. Unknown commands are silently ignored; per-command transport
//! failures are caught here, logged and reported as a short in-conversation
//! notice.

use std::collections::HashSet;
use tracing::{debug, warn};

use mbg_core::jid::phone_digits;
use mbg_core::{
    AccessMode, GatewayConfig, GroupSetting, InboundMessage, Jid, OutgoingMessage,
    ParticipantAction, Result, SharedMode,
};

use crate::menu;
use crate::moderation::{self, Decision, SuppressReason, GHOST_PLACEHOLDER};
use crate::session::{LinkPolicy, Session};

/// Parsed command text: token, positional arguments, joined argument text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub cmd: String,
    pub args: Vec<String>,
    pub arg_text: String,
}

/// Strip an optional leading prefix character, split on whitespace,
/// lowercase the command token
pub fn parse(text: &str, prefix: char) -> CommandInvocation {
    let trimmed = text.trim();
    let without = trimmed.strip_prefix(prefix).unwrap_or(trimmed);
    let mut parts = without.split_whitespace();
    let cmd = parts.next().unwrap_or("").to_lowercase();
    let args: Vec<String> = parts.map(str::to_string).collect();
    let arg_text = args.join(" ");
    CommandInvocation { cmd, args, arg_text }
}

/// Resolve target identities for a command: explicit mentions win, then the
/// quoted participant plus any phone-number arguments. Duplicates collapse,
/// first occurrence wins.
pub fn resolve_targets(msg: &InboundMessage, args: &[String]) -> Vec<Jid> {
    let mut ids = Vec::new();
    if let Some(ctx) = msg.content.context() {
        if !ctx.mentioned.is_empty() {
            return dedupe(ctx.mentioned.clone());
        }
        if let Some(participant) = &ctx.participant {
            ids.push(participant.clone());
        }
    }
    for arg in args {
        if let Some(jid) = Jid::from_phone(arg) {
            ids.push(jid);
        }
    }
    dedupe(ids)
}

fn dedupe(ids: Vec<Jid>) -> Vec<Jid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Entry point for one inbound chat message: moderation, then dispatch
pub async fn handle_inbound(
    config: &GatewayConfig,
    mode: &SharedMode,
    session: &Session,
    msg: &InboundMessage,
) {
    match moderation::evaluate(config, mode, session, msg).await {
        Decision::Delete => {
            // deletion failures are swallowed; the short-circuit holds
            if let Err(e) = session.transport.delete(&msg.key.conversation, &msg.key).await {
                warn!(session = %session.id, error = %e, "failed to delete link message");
            }
        }
        Decision::Suppress(SuppressReason::GhostMode) => {
            let reply = OutgoingMessage::text(GHOST_PLACEHOLDER);
            if let Err(e) = session.transport.send(&msg.key.conversation, reply).await {
                debug!(session = %session.id, error = %e, "ghost reply failed");
            }
        }
        Decision::Suppress(_) => {}
        Decision::Allow => dispatch(config, mode, session, msg).await,
    }
}

/// Dispatch the message's command, if any
pub async fn dispatch(
    config: &GatewayConfig,
    mode: &SharedMode,
    session: &Session,
    msg: &InboundMessage,
) {
    let Some(text) = msg.content.text() else {
        return;
    };
    let inv = parse(text, config.command_prefix);
    if inv.cmd.is_empty() {
        return;
    }

    let ctx = Ctx {
        config,
        mode,
        session,
        msg,
        inv: &inv,
    };

    debug!(
        session = %session.id,
        conversation = %msg.key.conversation,
        cmd = %inv.cmd,
        "dispatching"
    );

    let result = match inv.cmd.as_str() {
        "menu" => cmd_menu(&ctx).await,
        "owner" => cmd_owner(&ctx).await,
        "qr" => cmd_qr(&ctx).await,
        "tagall" => cmd_tagall(&ctx).await,
        "hidetag" => cmd_hidetag(&ctx).await,
        "kick" => cmd_membership(&ctx, ParticipantAction::Remove).await,
        "add" => cmd_membership(&ctx, ParticipantAction::Add).await,
        "promote" => cmd_membership(&ctx, ParticipantAction::Promote).await,
        "demote" => cmd_membership(&ctx, ParticipantAction::Demote).await,
        "kickall" => cmd_kickall(&ctx).await,
        "close" => cmd_setting(&ctx, GroupSetting::AdminsOnly).await,
        "open" => cmd_setting(&ctx, GroupSetting::Everyone).await,
        "welcome" => cmd_welcome(&ctx).await,
        "nolien" => cmd_link_policy(&ctx, LinkPolicy::ExceptAdmins).await,
        "nolien2" => cmd_link_policy(&ctx, LinkPolicy::All).await,
        "public" => cmd_public(&ctx).await,
        "private" => cmd_private(&ctx).await,
        "ghost" => cmd_ghost(&ctx).await,
        // unknown commands produce no output
        _ => return,
    };

    if let Err(e) = result {
        warn!(session = %session.id, cmd = %inv.cmd, error = %e, "command failed");
        let notice = format!("{}\nCommand failed: {e}", config.bot_name);
        let _ = session
            .transport
            .send(&msg.key.conversation, OutgoingMessage::text(notice))
            .await;
    }
}

struct Ctx<'a> {
    config: &'a GatewayConfig,
    mode: &'a SharedMode,
    session: &'a Session,
    msg: &'a InboundMessage,
    inv: &'a CommandInvocation,
}

impl Ctx<'_> {
    fn convo(&self) -> &Jid {
        &self.msg.key.conversation
    }

    async fn reply(&self, text: impl AsRef<str>) -> Result<()> {
        let body = format!("{}\n{}", self.config.bot_name, text.as_ref());
        self.session
            .transport
            .send(self.convo(), OutgoingMessage::text(body))
            .await
    }

    async fn is_owner(&self) -> bool {
        let number = phone_digits(self.msg.sender().number());
        self.session.is_owner(&number, self.config).await
    }

    async fn is_admin(&self) -> bool {
        self.convo().is_group()
            && moderation::is_group_admin(
                self.session.transport.as_ref(),
                self.convo(),
                self.msg.sender(),
            )
            .await
    }

    /// Group-only guard: replies with a notice and yields false outside
    /// groups
    async fn require_group(&self) -> Result<bool> {
        if self.convo().is_group() {
            return Ok(true);
        }
        self.reply("This command only works in groups.").await?;
        Ok(false)
    }

    /// Elevation guard: group admin or owner
    async fn require_admin(&self) -> Result<bool> {
        if self.is_admin().await || self.is_owner().await {
            return Ok(true);
        }
        self.reply("Only an admin or the owner can do that.").await?;
        Ok(false)
    }
}

async fn cmd_menu(ctx: &Ctx<'_>) -> Result<()> {
    let text = menu::build(ctx.config, ctx.msg.display_name());
    ctx.session
        .transport
        .send(ctx.convo(), OutgoingMessage::text(text))
        .await
}

async fn cmd_owner(ctx: &Ctx<'_>) -> Result<()> {
    let vcard = format!(
        "BEGIN:VCARD\nVERSION:3.0\nFN:{name}\nTEL;type=CELL;type=VOICE;waid={number}:+{number}\nEND:VCARD",
        name = ctx.config.owner_name,
        number = ctx.config.owner_number,
    );
    ctx.session
        .transport
        .send(
            ctx.convo(),
            OutgoingMessage::Contact {
                display_name: ctx.config.owner_name.clone(),
                vcard,
            },
        )
        .await
}

async fn cmd_qr(ctx: &Ctx<'_>) -> Result<()> {
    if ctx.inv.arg_text.is_empty() {
        return ctx
            .reply(format!("Usage: {}qr [text]", ctx.config.command_prefix))
            .await;
    }
    // rendering happens UI-side; echo the payload
    ctx.reply(&ctx.inv.arg_text).await
}

async fn cmd_tagall(ctx: &Ctx<'_>) -> Result<()> {
    if !ctx.require_group().await? {
        return Ok(());
    }
    let meta = ctx.session.transport.group_metadata(ctx.convo()).await?;
    let ids = meta.member_ids();
    let list = ids
        .iter()
        .map(|id| format!("- @{}", id.number()))
        .collect::<Vec<_>>()
        .join("\n");
    let text = format!("*{}*\n{list}", ctx.config.bot_name);
    ctx.session
        .transport
        .send(ctx.convo(), OutgoingMessage::text_with_mentions(text, ids))
        .await
}

async fn cmd_hidetag(ctx: &Ctx<'_>) -> Result<()> {
    if !ctx.require_group().await? {
        return Ok(());
    }

    let quoted = ctx
        .msg
        .content
        .context()
        .and_then(|c| c.quoted_text.clone());
    let text = if !ctx.inv.arg_text.is_empty() {
        ctx.inv.arg_text.clone()
    } else if let Some(quoted) = quoted {
        quoted
    } else {
        return ctx
            .reply(format!(
                "Usage: {p}hidetag [text] or {p}hidetag as a reply",
                p = ctx.config.command_prefix
            ))
            .await;
    };

    let meta = ctx.session.transport.group_metadata(ctx.convo()).await?;
    ctx.session
        .transport
        .send(
            ctx.convo(),
            OutgoingMessage::text_with_mentions(text, meta.member_ids()),
        )
        .await
}

async fn cmd_membership(ctx: &Ctx<'_>, action: ParticipantAction) -> Result<()> {
    if !ctx.require_group().await? {
        return Ok(());
    }
    if !ctx.require_admin().await? {
        return Ok(());
    }

    let (name, verb) = match action {
        ParticipantAction::Remove => ("kick", "kick"),
        ParticipantAction::Add => ("add", "add"),
        ParticipantAction::Promote => ("promote", "promote"),
        ParticipantAction::Demote => ("demote", "demote"),
    };

    let targets = resolve_targets(ctx.msg, &ctx.inv.args);
    if targets.is_empty() {
        return ctx
            .reply(format!(
                "Reply to, mention or pass a number: {}{name} @user",
                ctx.config.command_prefix
            ))
            .await;
    }

    for target in &targets {
        if let Err(e) = ctx
            .session
            .transport
            .update_participants(ctx.convo(), std::slice::from_ref(target), action)
            .await
        {
            warn!(session = %ctx.session.id, target = %target, error = %e, "membership update failed");
            ctx.reply(format!("Could not {verb} {}", target.number())).await?;
        }
    }
    Ok(())
}

async fn cmd_kickall(ctx: &Ctx<'_>) -> Result<()> {
    if !ctx.require_group().await? {
        return Ok(());
    }

    let meta = ctx.session.transport.group_metadata(ctx.convo()).await?;
    let admins: HashSet<&Jid> = meta
        .participants
        .iter()
        .filter(|p| p.admin)
        .map(|p| &p.jid)
        .collect();

    if !admins.contains(ctx.msg.sender()) && !ctx.is_owner().await {
        return ctx.reply("You are not an admin.").await;
    }

    for participant in &meta.participants {
        if participant.admin {
            continue;
        }
        if let Err(e) = ctx
            .session
            .transport
            .update_participants(
                ctx.convo(),
                std::slice::from_ref(&participant.jid),
                ParticipantAction::Remove,
            )
            .await
        {
            warn!(session = %ctx.session.id, target = %participant.jid, error = %e, "kick failed");
        }
    }

    ctx.session
        .transport
        .update_subject(ctx.convo(), &ctx.config.bot_name)
        .await
}

async fn cmd_setting(ctx: &Ctx<'_>, setting: GroupSetting) -> Result<()> {
    if !ctx.require_group().await? {
        return Ok(());
    }
    if !ctx.require_admin().await? {
        return Ok(());
    }
    ctx.session
        .transport
        .update_setting(ctx.convo(), setting)
        .await?;
    match setting {
        GroupSetting::AdminsOnly => ctx.reply("Group closed (admins only).").await,
        GroupSetting::Everyone => ctx.reply("Group opened.").await,
    }
}

async fn cmd_welcome(ctx: &Ctx<'_>) -> Result<()> {
    if !ctx.require_group().await? {
        return Ok(());
    }
    if !ctx.require_admin().await? {
        return Ok(());
    }
    let enabled = !ctx.inv.arg_text.eq_ignore_ascii_case("off");
    ctx.session.set_welcome(ctx.convo(), enabled).await;
    ctx.reply(format!("Welcome messages: {}", if enabled { "ON" } else { "OFF" }))
        .await
}

async fn cmd_link_policy(ctx: &Ctx<'_>, policy: LinkPolicy) -> Result<()> {
    if !ctx.require_group().await? {
        return Ok(());
    }
    if !ctx.require_admin().await? {
        return Ok(());
    }

    if ctx.inv.arg_text.eq_ignore_ascii_case("off") {
        ctx.session.set_link_policy(ctx.convo(), LinkPolicy::Off).await;
        return ctx.reply("Link filter disabled.").await;
    }

    ctx.session.set_link_policy(ctx.convo(), policy).await;
    match policy {
        LinkPolicy::ExceptAdmins => {
            ctx.reply("Link filter on: links are deleted EXCEPT from admins.").await
        }
        LinkPolicy::All => {
            ctx.reply("Link filter on: all links are deleted (admins included).").await
        }
        LinkPolicy::Off => ctx.reply("Link filter disabled.").await,
    }
}

async fn cmd_public(ctx: &Ctx<'_>) -> Result<()> {
    ctx.mode.set(AccessMode::Public).await;
    ctx.reply("Mode: public (anyone can use non-admin commands).").await
}

async fn cmd_private(ctx: &Ctx<'_>) -> Result<()> {
    if ctx.mode.get().await == AccessMode::Private {
        return ctx.reply("Private mode is already enabled.").await;
    }
    ctx.mode.set(AccessMode::Private).await;
    ctx.reply("Mode: *private* enabled.").await
}

async fn cmd_ghost(ctx: &Ctx<'_>) -> Result<()> {
    if !ctx.require_group().await? {
        return Ok(());
    }
    let active = ctx.session.toggle_ghost(ctx.convo()).await;
    if active {
        ctx.reply("Ghost mode enabled.").await
    } else {
        ctx.reply("Ghost mode disabled.").await
    }
}
