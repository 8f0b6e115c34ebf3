//! Conversation history
//!
//! Conversations persist to a single JSON file, keyed by the store path.
//! A pending assistant placeholder is created the moment a message is
//! sent and replaced in place once the backend answers (or fails).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub text: String,
    /// True while the backend reply is outstanding
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<ConversationMessage>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    fn new(title: String) -> Self {
        Self {
            id: format!("c-{}", uuid::Uuid::new_v4()),
            title,
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    conversations: Vec<Conversation>,
    selected: Option<String>,
}

/// File-backed conversation store
///
/// There is always at least one conversation and always a selection;
/// deleting the last conversation recreates an empty one.
pub struct ConversationStore {
    path: PathBuf,
    conversations: Vec<Conversation>,
    selected: String,
}

impl ConversationStore {
    /// Open the store, creating an initial empty conversation if the file
    /// does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<StoreFile>(&raw)
                .map_err(|e| Error::Store(format!("corrupt store file: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreFile::default(),
            Err(e) => return Err(Error::Store(e.to_string())),
        };

        let mut conversations = file.conversations;
        if conversations.is_empty() {
            conversations.push(Conversation::new("Conversation 1".to_string()));
        }

        let selected = file
            .selected
            .filter(|id| conversations.iter().any(|c| &c.id == id))
            .unwrap_or_else(|| conversations[0].id.clone());

        info!(
            path = %path.display(),
            conversations = conversations.len(),
            "conversation store opened"
        );

        Ok(Self {
            path,
            conversations,
            selected,
        })
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn selected(&self) -> &Conversation {
        // The selection invariant guarantees a match
        self.conversations
            .iter()
            .find(|c| c.id == self.selected)
            .unwrap_or(&self.conversations[0])
    }

    fn selected_mut(&mut self) -> &mut Conversation {
        let idx = self
            .conversations
            .iter()
            .position(|c| c.id == self.selected)
            .unwrap_or(0);
        &mut self.conversations[idx]
    }

    pub fn select(&mut self, id: &str) -> Result<()> {
        if !self.conversations.iter().any(|c| c.id == id) {
            return Err(Error::Store(format!("no conversation {id}")));
        }
        self.selected = id.to_string();
        self.save()
    }

    pub fn create(&mut self, title: Option<String>) -> Result<&Conversation> {
        let title =
            title.unwrap_or_else(|| format!("Conversation {}", self.conversations.len() + 1));
        let conversation = Conversation::new(title);
        self.selected = conversation.id.clone();
        self.conversations.insert(0, conversation);
        self.save()?;
        Ok(self.selected())
    }

    pub fn rename(&mut self, id: &str, title: &str) -> Result<()> {
        let conversation = self
            .conversations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::Store(format!("no conversation {id}")))?;
        conversation.title = title.to_string();
        self.save()
    }

    pub fn delete(&mut self, id: &str) -> Result<()> {
        self.conversations.retain(|c| c.id != id);
        if self.conversations.is_empty() {
            self.conversations
                .push(Conversation::new("Conversation 1".to_string()));
        }
        if !self.conversations.iter().any(|c| c.id == self.selected) {
            self.selected = self.conversations[0].id.clone();
        }
        self.save()
    }

    /// Record an outgoing message plus a pending assistant placeholder
    pub fn begin_exchange(&mut self, text: &str) -> Result<()> {
        let now = Utc::now();
        let conversation = self.selected_mut();
        conversation.messages.push(ConversationMessage {
            role: Role::User,
            text: text.to_string(),
            pending: false,
            timestamp: now,
        });
        conversation.messages.push(ConversationMessage {
            role: Role::Assistant,
            text: String::new(),
            pending: true,
            timestamp: now,
        });
        self.save()
    }

    /// Replace the pending placeholder with the backend reply
    pub fn resolve_pending(&mut self, reply: &str) -> Result<()> {
        self.fill_pending(reply.to_string())
    }

    /// Replace the pending placeholder with an error notice
    pub fn fail_pending(&mut self, notice: &str) -> Result<()> {
        self.fill_pending(format!("(error: {notice})"))
    }

    fn fill_pending(&mut self, text: String) -> Result<()> {
        let conversation = self.selected_mut();
        match conversation
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.pending)
        {
            Some(message) => {
                message.text = text;
                message.pending = false;
                message.timestamp = Utc::now();
            }
            None => warn!("no pending message to resolve"),
        }
        self.save()
    }

    fn save(&self) -> Result<()> {
        let file = StoreFile {
            conversations: self.conversations.clone(),
            selected: Some(self.selected.clone()),
        };
        let raw = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::Store(e.to_string()))?;
        std::fs::write(&self.path, raw).map_err(|e| Error::Store(e.to_string()))
    }
}
