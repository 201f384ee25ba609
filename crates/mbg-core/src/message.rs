//! Inbound message model
//!
//! The transport delivers messages in one of a few concrete shapes; the core
//! models them as a tagged variant with a single text-extraction function per
//! variant instead of probing optional payload fields.

use crate::jid::Jid;

/// Identifies one message within a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageKey {
    /// Conversation the message was posted in
    pub conversation: Jid,
    /// Sending participant (set for group messages)
    pub participant: Option<Jid>,
    /// Transport-assigned message id
    pub id: String,
    /// True when the session's own account sent the message
    pub from_me: bool,
}

/// Context attached to reply/extended messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContext {
    /// Explicitly mentioned identities
    pub mentioned: Vec<Jid>,
    /// Author of the quoted message
    pub participant: Option<Jid>,
    /// Text body of the quoted message, when text-bearing
    pub quoted_text: Option<String>,
    /// Link-preview URL, when the transport attached one
    pub preview_url: Option<String>,
}

/// Kind of media carrying a caption
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Document,
}

/// Message payload, tagged by shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// Plain conversation text
    Plain { text: String },
    /// Extended text, possibly replying to or mentioning others
    Reply { text: String, context: MessageContext },
    /// Media with a caption
    Caption {
        media: MediaKind,
        caption: String,
        context: Option<MessageContext>,
    },
    /// Any shape the core does not inspect
    Other,
}

impl MessageContent {
    /// The text body of this message, if it has one
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Plain { text } | Self::Reply { text, .. } => Some(text),
            Self::Caption { caption, .. } => Some(caption),
            Self::Other => None,
        }
    }

    /// Reply/mention context, if present
    pub fn context(&self) -> Option<&MessageContext> {
        match self {
            Self::Reply { context, .. } => Some(context),
            Self::Caption { context, .. } => context.as_ref(),
            _ => None,
        }
    }

    /// The media kind when this is a captioned media message
    pub fn media(&self) -> Option<MediaKind> {
        match self {
            Self::Caption { media, .. } => Some(*media),
            _ => None,
        }
    }
}

/// One inbound message as handed to the pipeline
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub key: MessageKey,
    /// Sender display name, when the transport reports one
    pub push_name: Option<String>,
    pub content: MessageContent,
}

impl InboundMessage {
    /// Build a plain-text message (test and loopback helper)
    pub fn plain(
        conversation: impl Into<Jid>,
        participant: Option<Jid>,
        id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            key: MessageKey {
                conversation: conversation.into(),
                participant,
                id: id.into(),
                from_me: false,
            },
            push_name: None,
            content: MessageContent::Plain { text: text.into() },
        }
    }

    pub fn with_push_name(mut self, name: impl Into<String>) -> Self {
        self.push_name = Some(name.into());
        self
    }

    pub fn from_me(mut self) -> Self {
        self.key.from_me = true;
        self
    }

    /// The identity that authored this message: the group participant when
    /// set, otherwise the conversation itself (direct chats).
    pub fn sender(&self) -> &Jid {
        self.key.participant.as_ref().unwrap_or(&self.key.conversation)
    }

    /// Display name for replies, with a neutral fallback
    pub fn display_name(&self) -> &str {
        self.push_name.as_deref().unwrap_or("User")
    }

    /// Every text-bearing field of the message: body or caption, quoted
    /// text, and any attached preview URL.
    pub fn text_fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        if let Some(text) = self.content.text() {
            fields.push(text);
        }
        if let Some(ctx) = self.content.context() {
            if let Some(quoted) = ctx.quoted_text.as_deref() {
                fields.push(quoted);
            }
            if let Some(url) = ctx.preview_url.as_deref() {
                fields.push(url);
            }
        }
        fields
    }
}
