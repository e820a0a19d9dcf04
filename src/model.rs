//! Conversation records as stored by the backends, and the transient
//! messages derived from them for display.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::format::parse_timestamp;

/// Status code the backends use for an active (not logically deleted) record.
pub const ACTIVE_STATUS: &str = "A";

/// A persisted prompt/response pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
    pub id: i64,
    pub message: String,
    pub response: String,
    #[serde(default = "default_status")]
    pub status: String,
    /// `yyyy-MM-dd HH:mm:ss`, as sent by the server.
    pub created_at: String,
}

fn default_status() -> String {
    ACTIVE_STATUS.to_string()
}

impl ConversationRecord {
    pub fn is_active(&self) -> bool {
        self.status == ACTIVE_STATUS
    }

    pub fn created_at_local(&self) -> Option<DateTime<Local>> {
        parse_timestamp(&self.created_at)
    }
}

/// Who wrote a displayed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Author {
    User,
    Assistant,
}

/// A message shown in the thread. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayMessage {
    pub content: String,
    pub author: Author,
    pub timestamp: DateTime<Local>,
    /// Set on the user half of a stored conversation.
    pub conversation_id: Option<i64>,
}

impl DisplayMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            author: Author::User,
            timestamp: Local::now(),
            conversation_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            author: Author::Assistant,
            timestamp: Local::now(),
            conversation_id: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.author == Author::User
    }

    /// Expand a stored record into the user/assistant pair that renders it.
    pub fn pair_from_record(record: &ConversationRecord) -> [DisplayMessage; 2] {
        let timestamp = record.created_at_local().unwrap_or_else(Local::now);
        [
            DisplayMessage {
                content: record.message.clone(),
                author: Author::User,
                timestamp,
                conversation_id: Some(record.id),
            },
            DisplayMessage {
                content: record.response.clone(),
                author: Author::Assistant,
                timestamp,
                conversation_id: None,
            },
        ]
    }
}

/// Keep only active records, oldest first.
pub fn visible_history(records: Vec<ConversationRecord>) -> Vec<ConversationRecord> {
    let mut visible: Vec<ConversationRecord> =
        records.into_iter().filter(ConversationRecord::is_active).collect();
    sort_by_creation(&mut visible);
    visible
}

/// Oldest first. Stable; unparseable timestamps sort first.
pub fn sort_by_creation(records: &mut [ConversationRecord]) {
    records.sort_by_key(|record| parse_timestamp(&record.created_at));
}
