//! Conversation and participant identities
//!
//! A `Jid` is the opaque address of a direct chat, group chat or participant
//! as reported by the protocol transport. The core only inspects the suffix
//! (direct vs. group vs. broadcast) and the number part before `@`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The status/broadcast pseudo-conversation. Messages addressed here are
/// dropped by the moderation pipeline.
pub const STATUS_BROADCAST: &str = "status@broadcast";

const USER_SUFFIX: &str = "@s.whatsapp.net";
const GROUP_SUFFIX: &str = "@g.us";

/// Opaque conversation or participant identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Jid(String);

impl Jid {
    /// Wrap a raw identity string as reported by the transport
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Synthesize a direct-conversation identity from a phone number.
    ///
    /// Strips every non-digit character (an optional leading `+` is
    /// tolerated and dropped). Returns `None` when no digits remain.
    /// Strings already carrying the direct-chat suffix pass through
    /// unchanged; anything else containing `@` (literal mention text,
    /// for example) is not an identity.
    pub fn from_phone(raw: &str) -> Option<Self> {
        if raw.ends_with(USER_SUFFIX) {
            return Some(Self::new(raw));
        }
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            None
        } else {
            Some(Self(format!("{digits}{USER_SUFFIX}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identity addresses a group conversation
    pub fn is_group(&self) -> bool {
        self.0.ends_with(GROUP_SUFFIX)
    }

    pub fn is_status_broadcast(&self) -> bool {
        self.0 == STATUS_BROADCAST
    }

    /// The number part before `@` (the whole string if there is no `@`)
    pub fn number(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Jid {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// Strip a phone-number string down to its digits
pub fn phone_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_suffix() {
        assert!(Jid::new("12036304@g.us").is_group());
        assert!(!Jid::new("50912345678@s.whatsapp.net").is_group());
    }

    #[test]
    fn test_status_broadcast() {
        assert!(Jid::new(STATUS_BROADCAST).is_status_broadcast());
        assert!(!Jid::new("50912345678@s.whatsapp.net").is_status_broadcast());
    }

    #[test]
    fn test_number_part() {
        assert_eq!(Jid::new("50912345678@s.whatsapp.net").number(), "50912345678");
        assert_eq!(Jid::new("naked").number(), "naked");
    }

    #[test]
    fn test_from_phone_normalization() {
        assert_eq!(
            Jid::from_phone("+1 (509) 123-45678").unwrap().as_str(),
            "150912345678@s.whatsapp.net"
        );
        assert_eq!(
            Jid::from_phone("50912345678").unwrap().as_str(),
            "50912345678@s.whatsapp.net"
        );
        assert!(Jid::from_phone("no digits").is_none());
        // literal mention text never becomes a target
        assert!(Jid::from_phone("@user").is_none());
    }

    #[test]
    fn test_from_phone_passthrough() {
        let jid = Jid::from_phone("50912345678@s.whatsapp.net").unwrap();
        assert_eq!(jid.as_str(), "50912345678@s.whatsapp.net");
    }

    #[test]
    fn test_phone_digits() {
        assert_eq!(phone_digits("+509 1234-5678"), "50912345678");
        assert_eq!(phone_digits(""), "");
    }
}
