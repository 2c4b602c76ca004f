//! Cross-tab insight: a best-effort, eventually-consistent summary of
//! what the captured pages collectively suggest the user is doing.
//!
//! Recomputation is serialized on its own queue key; readers may observe
//! a stale value. Every new value is broadcast on the event bus, where
//! delivery without listeners is a no-op.

use std::sync::Arc;

use chrono::Utc;
use log::debug;

use crate::analysis::{InsightDraft, ResilientAnalyzer};
use crate::db::{keys, Database, StorageArea};
use crate::error::EngineResult;
use crate::events::{EngineEvent, EventBus};
use crate::models::{AnalyzedPage, Insight};
use crate::queue::KeyedMutationQueue;

pub mod compare;

pub use compare::{compare_pages, PageComparison};

/// URL substring pairs used by the heuristic fallback: one page matching
/// the first group plus one matching the second implies the activity.
const LEARNING_HINTS: &[&str] = &["tutorial", "course", "learn", "lesson", "how-to"];
const REFERENCE_HINTS: &[&str] = &["docs", "wikipedia", "reference", "stackoverflow"];
const SHOPPING_HINTS: &[&str] = &["amazon.", "ebay.", "/shop", "/cart", "/product", "store."];

pub struct CrossTabInsightEngine {
    db: Database,
    queue: Arc<KeyedMutationQueue>,
    analyzer: Arc<ResilientAnalyzer>,
    events: EventBus,
}

impl CrossTabInsightEngine {
    pub fn new(
        db: Database,
        queue: Arc<KeyedMutationQueue>,
        analyzer: Arc<ResilientAnalyzer>,
        events: EventBus,
    ) -> Self {
        Self {
            db,
            queue,
            analyzer,
            events,
        }
    }

    /// Recompute the insight from the current page store. With fewer than
    /// two pages the stored prior value is returned untouched.
    pub async fn recompute(&self) -> EngineResult<Insight> {
        self.queue
            .with_lock(keys::CONTEXTUAL_INSIGHTS, move || async move {
                let pages: Vec<AnalyzedPage> = self
                    .db
                    .get_json(StorageArea::Durable, keys::CAPTURED_PAGES)
                    .await?
                    .unwrap_or_default();

                let prior: Option<Insight> = self
                    .db
                    .get_json(StorageArea::Durable, keys::CONTEXTUAL_INSIGHTS)
                    .await?;

                if pages.len() < 2 {
                    debug!("insight recompute skipped: {} page(s)", pages.len());
                    return Ok(prior.unwrap_or_else(Insight::initial));
                }

                let draft = match self.analyzer.provider() {
                    Some(provider) => match provider.synthesize_insight(&pages).await {
                        Ok(draft) => draft,
                        Err(err) => {
                            debug!("insight provider failed, using heuristic: {err}");
                            heuristic_insight(&pages)
                        }
                    },
                    None => heuristic_insight(&pages),
                };

                let insight = Insight {
                    activity: draft.activity,
                    connections: draft.connections,
                    insight: draft.insight,
                    updated_at: Utc::now(),
                };

                self.db
                    .put_json(StorageArea::Durable, keys::CONTEXTUAL_INSIGHTS, &insight)
                    .await?;
                self.events.emit(EngineEvent::InsightUpdated {
                    insight: insight.clone(),
                });

                Ok(insight)
            })
            .await
    }

    /// Latest stored insight, or the initial value before any recompute.
    pub async fn current(&self) -> EngineResult<Insight> {
        Ok(self
            .db
            .get_json(StorageArea::Durable, keys::CONTEXTUAL_INSIGHTS)
            .await?
            .unwrap_or_else(Insight::initial))
    }
}

/// Fallback activity/connection detection over URL substrings and shared
/// topics. Fixed pattern pairs, no model involved.
pub fn heuristic_insight(pages: &[AnalyzedPage]) -> InsightDraft {
    let url_hits = |hints: &[&str]| {
        pages
            .iter()
            .filter(|page| {
                let url = page.url.to_lowercase();
                hints.iter().any(|hint| url.contains(hint))
            })
            .count()
    };

    let learning = url_hits(LEARNING_HINTS);
    let reference = url_hits(REFERENCE_HINTS);
    let shopping = url_hits(SHOPPING_HINTS);

    let activity = if learning >= 1 && reference >= 1 {
        "studying"
    } else if shopping >= 2 {
        "comparison shopping"
    } else if pages
        .iter()
        .all(|page| page.intent == pages[0].intent)
    {
        pages[0].intent.as_str()
    } else {
        "browsing"
    }
    .to_string();

    // A topic appearing on two or more pages is treated as a connection.
    let mut connections: Vec<String> = Vec::new();
    for page in pages {
        for topic in &page.topics {
            if connections.contains(topic) {
                continue;
            }
            let appearances = pages
                .iter()
                .filter(|other| other.topics.contains(topic))
                .count();
            if appearances >= 2 {
                connections.push(topic.clone());
            }
        }
    }

    let insight = if connections.is_empty() {
        format!("{} open tabs, activity looks like {activity}.", pages.len())
    } else {
        format!(
            "{} open tabs around {}; activity looks like {activity}.",
            pages.len(),
            connections.join(", ")
        )
    };

    InsightDraft {
        activity,
        connections,
        insight,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{PageAnalysis, PageInput};

    fn page(url: &str, topics: &[&str]) -> AnalyzedPage {
        let mut page = AnalyzedPage::from_analysis(
            PageInput {
                title: url.to_string(),
                url: url.to_string(),
                raw_content: String::new(),
            },
            PageAnalysis::empty(),
            Utc::now(),
        );
        page.topics = topics.iter().map(|t| t.to_string()).collect();
        page
    }

    fn engine() -> (tempfile::TempDir, CrossTabInsightEngine, Database) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("test.sqlite3")).expect("open db");
        let queue = Arc::new(KeyedMutationQueue::new());
        let analyzer = Arc::new(ResilientAnalyzer::with_seeded_heuristic(None, 5));
        let engine =
            CrossTabInsightEngine::new(db.clone(), queue, analyzer, EventBus::new());
        (dir, engine, db)
    }

    async fn seed_pages(db: &Database, pages: &[AnalyzedPage]) {
        db.put_json(StorageArea::Durable, keys::CAPTURED_PAGES, &pages)
            .await
            .expect("seed pages");
    }

    #[tokio::test]
    async fn fewer_than_two_pages_leaves_prior_insight_untouched() {
        let (_dir, engine, db) = engine();

        seed_pages(
            &db,
            &[
                page("https://site.com/rust-tutorial", &["rust"]),
                page("https://docs.rs/tokio", &["rust"]),
            ],
        )
        .await;
        let established = engine.recompute().await.expect("recompute");

        seed_pages(&db, &[page("https://site.com/only-one", &[])]).await;
        let unchanged = engine.recompute().await.expect("recompute");

        assert_eq!(unchanged, established);
        assert_eq!(engine.current().await.expect("current"), established);
    }

    #[tokio::test]
    async fn learning_plus_reference_urls_imply_studying() {
        let (_dir, engine, db) = engine();
        seed_pages(
            &db,
            &[
                page("https://site.com/rust-tutorial", &["rust"]),
                page("https://en.wikipedia.org/wiki/Rust", &["rust"]),
            ],
        )
        .await;

        let insight = engine.recompute().await.expect("recompute");
        assert_eq!(insight.activity, "studying");
        assert_eq!(insight.connections, vec!["rust"]);
    }

    #[tokio::test]
    async fn recompute_broadcasts_to_subscribers() {
        let (_dir, engine, db) = engine();
        let mut rx = engine.events.subscribe();
        seed_pages(
            &db,
            &[
                page("https://amazon.com/item", &[]),
                page("https://store.example.com/thing", &[]),
            ],
        )
        .await;

        let insight = engine.recompute().await.expect("recompute");
        assert_eq!(insight.activity, "comparison shopping");

        match rx.try_recv().expect("event delivered") {
            EngineEvent::InsightUpdated { insight: seen } => assert_eq!(seen, insight),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn shared_topics_become_connections() {
        let pages = [
            page("https://a.com", &["async", "rust"]),
            page("https://b.com", &["rust"]),
            page("https://c.com", &["cooking"]),
        ];
        let draft = heuristic_insight(&pages);
        assert_eq!(draft.connections, vec!["rust"]);
    }
}
