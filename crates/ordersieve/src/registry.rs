//! The chat registry: which chats the pipeline listens to.
//!
//! A small JSON file mutated only by the operator CLI; the pipeline just
//! consults it. Removing a chat deactivates it rather than forgetting it,
//! so the deactivation reason and history survive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One monitored chat.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatEntry {
    /// External chat id.
    pub chat_id: String,
    /// Display name.
    pub chat_name: String,
    /// Kind: "group", "supergroup" or "channel".
    pub chat_type: String,
    /// Whether the pipeline listens to this chat.
    pub is_active: bool,
    /// When monitoring was last enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_at: Option<DateTime<Utc>>,
    /// When monitoring was last disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_at: Option<DateTime<Utc>>,
    /// Why monitoring was disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Operator priority, 1..=5 with 5 the most important.
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    1
}

/// File-backed registry of monitored chats.
pub struct ChatRegistry {
    path: PathBuf,
    chats: Mutex<HashMap<String, ChatEntry>>,
}

impl ChatRegistry {
    /// Load the registry; a missing file starts empty.
    pub fn load(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let chats = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(std::io::Error::other)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(err) => return Err(err),
        };
        let registry = Self {
            path,
            chats: Mutex::new(chats),
        };
        tracing::info!(
            chats = registry.chats.lock().expect("registry lock poisoned").len(),
            "chat registry loaded"
        );
        Ok(registry)
    }

    /// Whether a chat is actively monitored.
    pub fn is_monitored(&self, chat_id: &str) -> bool {
        self.chats
            .lock()
            .expect("registry lock poisoned")
            .get(chat_id)
            .is_some_and(|c| c.is_active)
    }

    /// Look up one chat.
    pub fn get(&self, chat_id: &str) -> Option<ChatEntry> {
        self.chats
            .lock()
            .expect("registry lock poisoned")
            .get(chat_id)
            .cloned()
    }

    /// All active chats, highest priority first.
    pub fn list_active(&self) -> Vec<ChatEntry> {
        let mut active: Vec<ChatEntry> = self
            .chats
            .lock()
            .expect("registry lock poisoned")
            .values()
            .filter(|c| c.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.chat_id.cmp(&b.chat_id)));
        active
    }

    /// Every chat, active or not.
    pub fn list_all(&self) -> Vec<ChatEntry> {
        let mut all: Vec<ChatEntry> = self
            .chats
            .lock()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.chat_id.cmp(&b.chat_id));
        all
    }

    /// Add a chat to monitoring, or reactivate and update an existing one.
    pub fn add(
        &self,
        chat_id: &str,
        chat_name: &str,
        chat_type: &str,
        priority: u8,
    ) -> std::io::Result<ChatEntry> {
        if !(1..=5).contains(&priority) {
            return Err(std::io::Error::other(format!(
                "priority must be 1..=5, got {priority}"
            )));
        }
        let entry = ChatEntry {
            chat_id: chat_id.to_string(),
            chat_name: chat_name.to_string(),
            chat_type: chat_type.to_string(),
            is_active: true,
            enabled_at: Some(Utc::now()),
            disabled_at: None,
            reason: None,
            priority,
        };
        {
            let mut chats = self.chats.lock().expect("registry lock poisoned");
            chats.insert(chat_id.to_string(), entry.clone());
        }
        self.save()?;
        tracing::info!(chat_id, chat_name, "chat added to monitoring");
        Ok(entry)
    }

    /// Deactivate a chat, recording the reason.
    pub fn remove(&self, chat_id: &str, reason: &str) -> std::io::Result<bool> {
        let found = {
            let mut chats = self.chats.lock().expect("registry lock poisoned");
            match chats.get_mut(chat_id) {
                Some(entry) => {
                    entry.is_active = false;
                    entry.disabled_at = Some(Utc::now());
                    entry.reason = Some(reason.to_string());
                    true
                }
                None => false,
            }
        };
        if found {
            self.save()?;
            tracing::info!(chat_id, reason, "chat removed from monitoring");
        }
        Ok(found)
    }

    /// Re-enable a previously disabled chat.
    pub fn enable(&self, chat_id: &str) -> std::io::Result<bool> {
        let found = {
            let mut chats = self.chats.lock().expect("registry lock poisoned");
            match chats.get_mut(chat_id) {
                Some(entry) => {
                    entry.is_active = true;
                    entry.enabled_at = Some(Utc::now());
                    entry.disabled_at = None;
                    entry.reason = None;
                    true
                }
                None => false,
            }
        };
        if found {
            self.save()?;
        }
        Ok(found)
    }

    /// Disable a chat without forgetting it.
    pub fn disable(&self, chat_id: &str, reason: &str) -> std::io::Result<bool> {
        self.remove(chat_id, reason)
    }

    /// Set a chat's priority (1..=5).
    pub fn set_priority(&self, chat_id: &str, priority: u8) -> std::io::Result<bool> {
        if !(1..=5).contains(&priority) {
            return Err(std::io::Error::other(format!(
                "priority must be 1..=5, got {priority}"
            )));
        }
        let found = {
            let mut chats = self.chats.lock().expect("registry lock poisoned");
            match chats.get_mut(chat_id) {
                Some(entry) => {
                    entry.priority = priority;
                    true
                }
                None => false,
            }
        };
        if found {
            self.save()?;
        }
        Ok(found)
    }

    /// Forget every chat. Destructive; used by the operator CLI only.
    pub fn clear(&self) -> std::io::Result<usize> {
        let removed = {
            let mut chats = self.chats.lock().expect("registry lock poisoned");
            let removed = chats.len();
            chats.clear();
            removed
        };
        self.save()?;
        tracing::info!(removed, "chat registry cleared");
        Ok(removed)
    }

    fn save(&self) -> std::io::Result<()> {
        let chats = self.chats.lock().expect("registry lock poisoned");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(&*chats).map_err(std::io::Error::other)?;
        std::fs::write(&self.path, raw)
    }

    /// The file this registry persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
