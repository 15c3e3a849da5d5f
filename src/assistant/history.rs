//! Assistant chat history, loaded once at start and saved on every change.
//!
//! Chats are kept newest first. With a path configured every mutation
//! rewrites the JSON file (via a temp file + rename); without one the store
//! lives in memory only. An empty history removes the file.
//!
//! Mutations are applied to a copy and only become visible once the save
//! succeeds, so memory never runs ahead of disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::HistoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl ChatEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub entries: Vec<ChatEntry>,
}

pub struct ChatHistoryStore {
    path: Option<PathBuf>,
    chats: Mutex<Vec<Chat>>,
}

impl ChatHistoryStore {
    /// Store that never touches disk.
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self {
            path: None,
            chats: Mutex::new(Vec::new()),
        })
    }

    /// Load history from `path`. A missing file is an empty history.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Arc<Self>, HistoryError> {
        let path = path.into();
        let chats: Vec<Chat> = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), chats = chats.len(), "Chat history loaded");
        Ok(Arc::new(Self {
            path: Some(path),
            chats: Mutex::new(chats),
        }))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn chats(&self) -> Vec<Chat> {
        self.chats.lock().await.clone()
    }

    pub async fn chat(&self, id: &str) -> Option<Chat> {
        self.chats.lock().await.iter().find(|c| c.id == id).cloned()
    }

    /// Start a chat seeded with `greeting` from the assistant.
    pub async fn new_chat(&self, greeting: &str) -> Result<Chat, HistoryError> {
        let chat = Chat {
            id: format!("chat-{}", Uuid::new_v4()),
            created_at: Utc::now(),
            entries: vec![ChatEntry::assistant(greeting)],
        };

        let mut chats = self.chats.lock().await;
        let mut next = Vec::with_capacity(chats.len() + 1);
        next.push(chat.clone());
        next.extend(chats.iter().cloned());
        self.save(&next).await?;
        *chats = next;

        debug!(chat_id = %chat.id, "Chat created");
        Ok(chat)
    }

    /// Returns false when no chat has that id.
    pub async fn delete_chat(&self, id: &str) -> Result<bool, HistoryError> {
        let mut chats = self.chats.lock().await;
        if !chats.iter().any(|c| c.id == id) {
            return Ok(false);
        }
        let next: Vec<Chat> = chats.iter().filter(|c| c.id != id).cloned().collect();
        self.save(&next).await?;
        *chats = next;
        Ok(true)
    }

    /// Append entries to a chat. Returns false when no chat has that id.
    pub async fn append(&self, id: &str, entries: Vec<ChatEntry>) -> Result<bool, HistoryError> {
        let mut chats = self.chats.lock().await;
        let mut next = chats.clone();
        let Some(chat) = next.iter_mut().find(|c| c.id == id) else {
            return Ok(false);
        };
        chat.entries.extend(entries);
        self.save(&next).await?;
        *chats = next;
        Ok(true)
    }

    async fn save(&self, chats: &[Chat]) -> Result<(), HistoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if chats.is_empty() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(chats)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}
