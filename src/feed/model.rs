//! Canonical email record and its enumerated fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label assigned when the feed row carries none.
pub const UNLABELED: &str = "Unlabeled";

/// One normalized row of the processed-email feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Email {
    /// Message identifier, or an `email-<n>` placeholder that is only
    /// meaningful within the fetch that produced it.
    pub id: String,
    pub sender: String,
    pub subject: String,
    /// Human-readable summary of the message.
    pub body: String,
    /// Category tag assigned upstream by the classifier. Opaque to us.
    pub label: String,
    pub category: Category,
    pub processed_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

/// Mailbox the message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    #[default]
    Inbox,
    Sent,
    Outbox,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Sent => "sent",
            Self::Outbox => "outbox",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inbox" => Ok(Self::Inbox),
            "sent" => Ok(Self::Sent),
            "outbox" => Ok(Self::Outbox),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Whether downstream processing of the message succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Synced,
    Pending,
    Failed,
}

impl SyncStatus {
    /// Raw status string. Sorting by status compares these, not a severity rank.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synced" => Ok(Self::Synced),
            "pending" => Ok(Self::Pending),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown sync status: {}", s)),
        }
    }
}
