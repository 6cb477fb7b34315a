//! The inbound message shape delivered by the messaging-network client
//!
//! The network client itself is an external collaborator; this is the
//! contract it delivers updates through. Serde derives make the shape
//! usable as an NDJSON bridge format as well.

use crate::category::ChatKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The chat a message arrived from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRef {
    /// Opaque stable external id.
    pub id: String,

    /// Display name; empty for unnamed private chats.
    #[serde(default)]
    pub name: String,

    /// Kind of chat.
    pub kind: ChatKind,

    /// Public username of the chat, when it has one. Used for permalinks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// The author of a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    /// Opaque external id.
    pub id: String,

    /// Display name, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether the author is a bot account.
    #[serde(default)]
    pub is_bot: bool,

    /// Whether the author is the session's own account.
    #[serde(default, rename = "is_self")]
    pub is_self: bool,
}

/// A single inbound update from the messaging network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundMessage {
    /// External message id, stable within the chat.
    pub id: String,

    /// The originating chat.
    pub chat: ChatRef,

    /// The author, when the network exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,

    /// Plain text body, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Media caption, used as the body when `text` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    /// Whether the message carries media.
    #[serde(default)]
    pub has_media: bool,

    /// Whether the message was forwarded from elsewhere.
    #[serde(default)]
    pub forwarded: bool,

    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
}

impl InboundMessage {
    /// The raw body: the text field, falling back to the caption.
    ///
    /// Returns `None` when neither carries any non-whitespace content.
    pub fn body(&self) -> Option<&str> {
        self.text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.caption.as_deref().filter(|c| !c.trim().is_empty()))
    }

    /// Author id, or the conventional placeholder when unknown.
    pub fn author_id(&self) -> &str {
        self.author.as_ref().map(|a| a.id.as_str()).unwrap_or("unknown")
    }

    /// Author display name, when known.
    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.name.as_deref())
    }
}
