//! Per-conversation message log and TTL-bound page-context cache.
//!
//! Both live in the session storage area, keyed by tab id, and are
//! cleared wholesale by the engine's suspend teardown. Mutations route
//! through the mutation queue keyed by conversation id, so two chat
//! turns on the same tab never clobber each other's appends while turns
//! on different tabs proceed in parallel.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::db::{keys, Database, StorageArea};
use crate::error::EngineResult;
use crate::models::{ConversationMessage, PageContextEntry, Role};
use crate::queue::KeyedMutationQueue;

pub const MAX_MESSAGES: usize = 50;
pub const CONTEXT_TTL_SECS: i64 = 5 * 60;

#[derive(Clone)]
pub struct ConversationCache {
    db: Database,
    queue: Arc<KeyedMutationQueue>,
}

impl ConversationCache {
    pub fn new(db: Database, queue: Arc<KeyedMutationQueue>) -> Self {
        Self { db, queue }
    }

    /// Append one message, pruning the oldest past `MAX_MESSAGES`.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: Role,
        content: impl Into<String>,
    ) -> EngineResult<ConversationMessage> {
        let message = ConversationMessage {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        };

        self.queue
            .with_lock(conversation_id, move || async move {
                let key = keys::chat_history(conversation_id);
                let mut history: VecDeque<ConversationMessage> = self
                    .db
                    .get_json(StorageArea::Session, &key)
                    .await?
                    .unwrap_or_default();

                history.push_back(message.clone());
                while history.len() > MAX_MESSAGES {
                    history.pop_front();
                }

                self.db.put_json(StorageArea::Session, &key, &history).await?;
                Ok(message)
            })
            .await
    }

    pub async fn history(&self, conversation_id: &str) -> EngineResult<Vec<ConversationMessage>> {
        let key = keys::chat_history(conversation_id);
        Ok(self
            .db
            .get_json::<VecDeque<ConversationMessage>>(StorageArea::Session, &key)
            .await?
            .map(|messages| messages.into_iter().collect())
            .unwrap_or_default())
    }

    /// Cache page context for this conversation, stamped with now.
    pub async fn set_context(
        &self,
        conversation_id: &str,
        context: PageContextEntry,
    ) -> EngineResult<()> {
        self.set_context_at(conversation_id, context, Utc::now()).await
    }

    pub(crate) async fn set_context_at(
        &self,
        conversation_id: &str,
        mut context: PageContextEntry,
        cached_at: DateTime<Utc>,
    ) -> EngineResult<()> {
        context.cached_at = cached_at;
        self.queue
            .with_lock(conversation_id, move || async move {
                let key = keys::page_context(conversation_id);
                self.db.put_json(StorageArea::Session, &key, &context).await?;
                Ok(())
            })
            .await
    }

    /// Cached context, or `None` once it has aged past the TTL. Expired
    /// entries are evicted on read.
    pub async fn context(&self, conversation_id: &str) -> EngineResult<Option<PageContextEntry>> {
        self.context_at(conversation_id, Utc::now()).await
    }

    pub(crate) async fn context_at(
        &self,
        conversation_id: &str,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<PageContextEntry>> {
        self.queue
            .with_lock(conversation_id, move || async move {
                let key = keys::page_context(conversation_id);
                let Some(context) = self
                    .db
                    .get_json::<PageContextEntry>(StorageArea::Session, &key)
                    .await?
                else {
                    return Ok(None);
                };

                if now - context.cached_at >= Duration::seconds(CONTEXT_TTL_SECS) {
                    self.db.remove(StorageArea::Session, &key).await?;
                    return Ok(None);
                }
                Ok(Some(context))
            })
            .await
    }

    /// Drop one conversation's history and cached context.
    pub async fn clear(&self, conversation_id: &str) -> EngineResult<()> {
        self.queue
            .with_lock(conversation_id, move || async move {
                self.db
                    .remove(StorageArea::Session, &keys::chat_history(conversation_id))
                    .await?;
                self.db
                    .remove(StorageArea::Session, &keys::page_context(conversation_id))
                    .await?;
                Ok(())
            })
            .await
    }

    /// Suspend teardown: drop every conversation key.
    pub async fn clear_all(&self) -> EngineResult<()> {
        self.db.clear_session_area().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentType;

    fn cache() -> (tempfile::TempDir, ConversationCache) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("test.sqlite3")).expect("open db");
        (dir, ConversationCache::new(db, Arc::new(KeyedMutationQueue::new())))
    }

    fn context_for(url: &str) -> PageContextEntry {
        PageContextEntry {
            title: "Page".to_string(),
            url: url.to_string(),
            content_type: ContentType::Article,
            main_topics: vec!["rust".to_string()],
            entities: vec!["tokio".to_string()],
            summary: "A page about things.".to_string(),
            cached_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn history_is_capped_dropping_oldest_first() {
        let (_dir, cache) = cache();

        for i in 0..60 {
            cache
                .append_message("7", Role::User, format!("message {i}"))
                .await
                .expect("append");
        }

        let history = cache.history("7").await.expect("history");
        assert_eq!(history.len(), MAX_MESSAGES);
        assert_eq!(history[0].content, "message 10");
        assert_eq!(history.last().expect("non-empty").content, "message 59");
    }

    #[tokio::test]
    async fn conversations_are_isolated_by_id() {
        let (_dir, cache) = cache();

        cache.append_message("1", Role::User, "one").await.expect("append");
        cache
            .append_message("2", Role::Assistant, "two")
            .await
            .expect("append");

        assert_eq!(cache.history("1").await.expect("history").len(), 1);
        assert_eq!(cache.history("2").await.expect("history").len(), 1);
        cache.clear("1").await.expect("clear");
        assert!(cache.history("1").await.expect("history").is_empty());
        assert_eq!(cache.history("2").await.expect("history").len(), 1);
    }

    #[tokio::test]
    async fn context_respects_the_ttl_boundary() {
        let (_dir, cache) = cache();
        let now = Utc::now();

        // 4:59 old: still present.
        cache
            .set_context_at("7", context_for("https://a.com"), now - Duration::seconds(299))
            .await
            .expect("set");
        assert!(cache.context_at("7", now).await.expect("get").is_some());

        // Exactly 5:00 old: logically absent and evicted.
        cache
            .set_context_at("7", context_for("https://a.com"), now - Duration::seconds(300))
            .await
            .expect("set");
        assert!(cache.context_at("7", now).await.expect("get").is_none());

        // Evict-on-read removed the row itself.
        let raw = cache
            .db
            .get_raw(StorageArea::Session, &keys::page_context("7"))
            .await
            .expect("raw");
        assert!(raw.is_none());
    }

    #[tokio::test]
    async fn clear_all_empties_every_conversation() {
        let (_dir, cache) = cache();
        cache.append_message("1", Role::User, "one").await.expect("append");
        cache
            .set_context("1", context_for("https://a.com"))
            .await
            .expect("set");

        cache.clear_all().await.expect("clear all");

        assert!(cache.history("1").await.expect("history").is_empty());
        assert!(cache.context("1").await.expect("context").is_none());
    }
}
