//! Bounded cache of recent exchanges
//!
//! Every successful exchange is appended and the list is trimmed to the most
//! recent [`MAX_HISTORY_ENTRIES`] before being written back under
//! [`HISTORY_KEY`] as a JSON array. The cache is never replayed into the
//! transcript; each session starts with an empty transcript.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::KeyValueStore;

pub const HISTORY_KEY: &str = "conversationHistory";
pub const MAX_HISTORY_ENTRIES: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub user_message: String,
    pub agent_response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

impl HistoryEntry {
    pub fn new(
        user_message: impl Into<String>,
        agent_response: impl Into<String>,
        conversation_id: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user_message: user_message.into(),
            agent_response: agent_response.into(),
            conversation_id,
        }
    }
}

#[derive(Debug, Default)]
pub struct ConversationHistory {
    entries: Vec<HistoryEntry>,
}

impl ConversationHistory {
    /// Read the stored history. Absent or corrupt data yields an empty history.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let entries = match store.get(HISTORY_KEY) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("Discarding unreadable conversation history: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let mut history = Self { entries };
        history.truncate();
        history
    }

    /// Entries, oldest first.
    pub fn load_all(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn record(&mut self, entry: HistoryEntry, store: &mut dyn KeyValueStore) -> Result<()> {
        self.entries.push(entry);
        self.truncate();
        store.set(HISTORY_KEY, serde_json::to_string(&self.entries)?)
    }

    fn truncate(&mut self) {
        if self.entries.len() > MAX_HISTORY_ENTRIES {
            let excess = self.entries.len() - MAX_HISTORY_ENTRIES;
            self.entries.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
