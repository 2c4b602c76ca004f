//! Conversation data model: per-tab message log and the cached page
//! context used to ground answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::page::ContentType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Condensed summary of a captured page, cached per conversation for
/// `CONTEXT_TTL`. An entry past its TTL is treated as absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContextEntry {
    pub title: String,
    pub url: String,
    pub content_type: ContentType,
    pub main_topics: Vec<String>,
    pub entities: Vec<String>,
    pub summary: String,
    pub cached_at: DateTime<Utc>,
}

/// Intermediate states of a chat turn, reported to progress listeners.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ChatPhase {
    Thinking,
    Contextualizing,
    Reasoning,
}

impl ChatPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatPhase::Thinking => "thinking",
            ChatPhase::Contextualizing => "contextualizing",
            ChatPhase::Reasoning => "reasoning",
        }
    }
}
