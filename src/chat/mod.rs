//! Chat turn orchestration.
//!
//! A turn appends the user message, optionally gathers page context
//! (cached, or built fresh from the page store), calls the provider, and
//! appends the reply. Provider failures surface as a fixed apology with
//! the conversation left as it was after the user's message; only
//! storage failures propagate as errors.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::{ChatRequest, ProgressSink, ResilientAnalyzer};
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus};
use crate::models::{AnalyzedPage, ChatPhase, ContentType, PageContextEntry, Role};
use crate::store::{ConversationCache, PageStore};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Returned verbatim when the provider cannot produce an answer.
pub const CHAT_APOLOGY: &str =
    "Sorry, I wasn't able to answer that just now. Please try again in a moment.";

/// A message matching any of these is taken to be about the current page
/// even without the explicit context flag.
const CONTEXT_PHRASES: &[&str] = &[
    "this page",
    "this site",
    "this article",
    "current page",
    "summarize",
    "summarise",
    "here",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub message: String,
    pub conversation_id: String,
    #[serde(default)]
    pub include_context: bool,
    #[serde(default)]
    pub current_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub success: bool,
    pub response: String,
    pub used_context: bool,
}

pub struct ChatOrchestrator {
    conversations: ConversationCache,
    store: PageStore,
    analyzer: Arc<ResilientAnalyzer>,
    events: EventBus,
}

impl ChatOrchestrator {
    pub fn new(
        conversations: ConversationCache,
        store: PageStore,
        analyzer: Arc<ResilientAnalyzer>,
        events: EventBus,
    ) -> Self {
        Self {
            conversations,
            store,
            analyzer,
            events,
        }
    }

    pub async fn run_turn(&self, turn: ChatTurn) -> EngineResult<ChatReply> {
        self.progress(&turn.conversation_id, ChatPhase::Thinking);

        self.conversations
            .append_message(&turn.conversation_id, Role::User, &turn.message)
            .await?;

        let context = if turn.include_context || wants_context(&turn.message) {
            self.progress(&turn.conversation_id, ChatPhase::Contextualizing);
            Some(self.gather_context(&turn).await?)
        } else {
            None
        };

        // The provider receives the message separately, so the history it
        // sees stops just before the message appended above.
        let history = self.conversations.history(&turn.conversation_id).await?;
        let prior = &history[..history.len().saturating_sub(1)];

        let request = ChatRequest {
            message: &turn.message,
            history: prior,
            context: context.as_ref(),
        };
        let sink = self.reasoning_sink(&turn.conversation_id);

        match self.analyzer.chat(request, &sink).await {
            Ok(response) => {
                self.conversations
                    .append_message(&turn.conversation_id, Role::Assistant, &response)
                    .await?;
                Ok(ChatReply {
                    success: true,
                    response,
                    used_context: context.is_some(),
                })
            }
            Err(EngineError::Storage(err)) => Err(EngineError::Storage(err)),
            Err(err) => {
                log_warn!(
                    "chat turn failed for conversation {}: {err}",
                    turn.conversation_id
                );
                Ok(ChatReply {
                    success: false,
                    response: CHAT_APOLOGY.to_string(),
                    used_context: context.is_some(),
                })
            }
        }
    }

    /// Cached context if still fresh, otherwise built from the captured
    /// page for the tab's current URL (a stub when uncaptured) and cached.
    async fn gather_context(&self, turn: &ChatTurn) -> EngineResult<PageContextEntry> {
        if let Some(cached) = self.conversations.context(&turn.conversation_id).await? {
            return Ok(cached);
        }

        let captured = match &turn.current_url {
            Some(url) => self.store.find_by_url(url).await?,
            None => None,
        };
        let context = match captured {
            Some(page) => context_from_page(&page),
            None => stub_context(turn.current_url.as_deref()),
        };

        self.conversations
            .set_context(&turn.conversation_id, context.clone())
            .await?;
        Ok(context)
    }

    fn progress(&self, conversation_id: &str, phase: ChatPhase) {
        self.events.emit(EngineEvent::ChatProgress {
            conversation_id: conversation_id.to_string(),
            phase,
        });
    }

    /// Sink handed to the provider so its `reasoning` notifications land
    /// on the same event stream as the orchestrator's own phases.
    fn reasoning_sink(&self, conversation_id: &str) -> ProgressSink {
        let events = self.events.clone();
        let conversation_id = conversation_id.to_string();
        Arc::new(move |phase| {
            events.emit(EngineEvent::ChatProgress {
                conversation_id: conversation_id.clone(),
                phase,
            });
        })
    }
}

fn wants_context(message: &str) -> bool {
    let message = message.to_lowercase();
    CONTEXT_PHRASES.iter().any(|phrase| message.contains(phrase))
}

fn context_from_page(page: &AnalyzedPage) -> PageContextEntry {
    let summary = page
        .claims
        .first()
        .map(|claim| claim.claim.clone())
        .unwrap_or_else(|| page.raw_content.chars().take(200).collect());

    PageContextEntry {
        title: page.title.clone(),
        url: page.url.clone(),
        content_type: page.content_type,
        main_topics: page.topics.clone(),
        entities: page.entities.iter().map(|m| m.entity.clone()).collect(),
        summary,
        cached_at: page.processed_at,
    }
}

fn stub_context(url: Option<&str>) -> PageContextEntry {
    PageContextEntry {
        title: "Current page".to_string(),
        url: url.unwrap_or_default().to_string(),
        content_type: ContentType::Article,
        main_topics: Vec::new(),
        entities: Vec::new(),
        summary: "This page has not been captured yet.".to_string(),
        cached_at: chrono::Utc::now(),
    }
}
