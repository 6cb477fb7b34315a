//! Order taxonomy and related closed sets
//!
//! The category set is closed and matches the deployed backend's `category`
//! column values exactly, including the slash and hyphen spellings.

use serde::{Deserialize, Serialize};

/// Category of a detected service-procurement order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OrderCategory {
    /// Server-side development: APIs, databases, integrations.
    Backend,

    /// Client-side web development.
    Frontend,

    /// Native and cross-platform mobile applications.
    Mobile,

    /// Machine learning, LLM integrations, data work.
    #[serde(rename = "AI/ML")]
    AiMl,

    /// No-code and low-code platform work.
    #[serde(rename = "Low-Code")]
    LowCode,

    /// Anything that does not fit the categories above.
    Other,
}

impl OrderCategory {
    /// All categories, in display order.
    pub const ALL: [OrderCategory; 6] = [
        OrderCategory::Backend,
        OrderCategory::Frontend,
        OrderCategory::Mobile,
        OrderCategory::AiMl,
        OrderCategory::LowCode,
        OrderCategory::Other,
    ];

    /// The stored string form of this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backend => "Backend",
            Self::Frontend => "Frontend",
            Self::Mobile => "Mobile",
            Self::AiMl => "AI/ML",
            Self::LowCode => "Low-Code",
            Self::Other => "Other",
        }
    }

    /// Parse a stored or wire string into a category.
    ///
    /// Matching is case-insensitive because remote classifiers are not
    /// reliable about casing. Returns `None` for anything outside the
    /// closed set.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
    }
}

impl std::fmt::Display for OrderCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an order was detected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    /// Deterministic pattern-bank match (tier A).
    Regex,

    /// Remote classifier verdict (tier D).
    Llm,

    /// Operator-entered order.
    Manual,
}

impl DetectionMethod {
    /// The stored string form of this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regex => "regex",
            Self::Llm => "llm",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of chat a message originated from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// Plain group chat.
    Group,

    /// Large group with channel-like features.
    Supergroup,

    /// Broadcast channel.
    Channel,

    /// One-on-one conversation.
    Private,
}

impl ChatKind {
    /// The stored string form of this kind.
    ///
    /// Supergroups are stored as `group`; the backend's `chat_type` column
    /// only distinguishes group, channel and private.
    pub fn as_storage_str(&self) -> &'static str {
        match self {
            Self::Group | Self::Supergroup => "group",
            Self::Channel => "channel",
            Self::Private => "private",
        }
    }
}
