//! Capture pipeline: turns a tab-load event into an analyzed page record.
//!
//! Each event walks Idle -> Extracting -> Analyzing -> Storing -> Done,
//! or terminates at Skipped for browser-internal URLs. A failing tab
//! never aborts the others; its error is logged and swallowed by the
//! batch entry points.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::analysis::ResilientAnalyzer;
use crate::error::EngineResult;
use crate::insight::CrossTabInsightEngine;
use crate::models::{AnalyzedPage, PageAnalysis, PageInput};
use crate::store::PageStore;

pub mod extract;

pub use extract::{extract_content, is_internal_url, MAX_CONTENT_CHARS};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Raw payload from a tab that finished loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    pub title: String,
    pub url: String,
    pub content: String,
}

/// Where a capture ended up. `Done` and `Skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CapturePhase {
    Idle,
    Extracting,
    Analyzing,
    Storing,
    Done,
    Skipped,
}

#[derive(Clone)]
pub struct CaptureCoordinator {
    store: PageStore,
    analyzer: Arc<ResilientAnalyzer>,
    insights: Arc<CrossTabInsightEngine>,
    shutdown: CancellationToken,
}

impl CaptureCoordinator {
    pub fn new(
        store: PageStore,
        analyzer: Arc<ResilientAnalyzer>,
        insights: Arc<CrossTabInsightEngine>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            analyzer,
            insights,
            shutdown,
        }
    }

    /// Capture one tab. Returns `None` for skipped internal URLs. On
    /// completion the insight recompute runs fire-and-forget; it is not
    /// part of the capture transaction.
    pub async fn capture_tab(&self, snapshot: PageSnapshot) -> EngineResult<Option<AnalyzedPage>> {
        if is_internal_url(&snapshot.url) {
            log_info!(
                "capture skipped for internal url {} ({:?})",
                snapshot.url,
                CapturePhase::Skipped
            );
            return Ok(None);
        }

        let content = extract_content(&snapshot.content);
        if content.is_empty() {
            log_warn!(
                "no content extracted from {}, storing empty record",
                snapshot.url
            );
        }

        let input = PageInput {
            title: snapshot.title,
            url: snapshot.url,
            raw_content: content,
        };

        let analysis = if input.raw_content.is_empty() {
            PageAnalysis::empty()
        } else {
            self.analyzer.analyze(&input).await
        };

        let page = AnalyzedPage::from_analysis(input, analysis, Utc::now());
        let stored = self.store.capture(page).await?;

        log_info!(
            "captured {} ({} entities, {} claims, {:?})",
            stored.url,
            stored.entities.len(),
            stored.claims.len(),
            CapturePhase::Done
        );

        self.spawn_insight_recompute();
        Ok(Some(stored))
    }

    /// Capture a batch of tabs. Failures are isolated per tab: each is
    /// logged and the rest proceed. Returns the successfully stored pages.
    pub async fn capture_many(&self, snapshots: Vec<PageSnapshot>) -> Vec<AnalyzedPage> {
        let mut stored = Vec::new();
        for snapshot in snapshots {
            let url = snapshot.url.clone();
            match self.capture_tab(snapshot).await {
                Ok(Some(page)) => stored.push(page),
                Ok(None) => {}
                Err(err) => log_warn!("capture failed for {url}: {err}"),
            }
        }
        stored
    }

    /// Re-run analysis over every stored page and recompute the insight.
    /// Capture timestamps are preserved; only the derived fields and
    /// `processed_at` change.
    pub async fn refresh_analysis(&self) -> EngineResult<()> {
        let pages = self.store.list().await?;
        for mut page in pages {
            let input = PageInput {
                title: page.title.clone(),
                url: page.url.clone(),
                raw_content: page.raw_content.clone(),
            };
            let analysis = if input.raw_content.is_empty() {
                PageAnalysis::empty()
            } else {
                self.analyzer.analyze(&input).await
            };

            page.entities = analysis.entities;
            page.topics = analysis.topics;
            page.claims = analysis.claims;
            page.intent = analysis.intent;
            page.content_type = analysis.content_type;
            page.processed_at = Utc::now();

            if let Err(err) = self.store.capture(page).await {
                log_warn!("refresh failed for a stored page: {err}");
            }
        }

        self.insights.recompute().await?;
        Ok(())
    }

    fn spawn_insight_recompute(&self) {
        let insights = Arc::clone(&self.insights);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                result = insights.recompute() => {
                    if let Err(err) = result {
                        log_warn!("background insight recompute failed: {err}");
                    }
                }
                _ = shutdown.cancelled() => {
                    log_info!("insight recompute cancelled by shutdown");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::events::EventBus;
    use crate::queue::KeyedMutationQueue;

    fn coordinator() -> (tempfile::TempDir, CaptureCoordinator) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(dir.path().join("test.sqlite3")).expect("open db");
        let queue = Arc::new(KeyedMutationQueue::new());
        let analyzer = Arc::new(ResilientAnalyzer::with_seeded_heuristic(None, 11));
        let store = PageStore::new(db.clone(), Arc::clone(&queue));
        let insights = Arc::new(CrossTabInsightEngine::new(
            db,
            queue,
            Arc::clone(&analyzer),
            EventBus::new(),
        ));
        (
            dir,
            CaptureCoordinator::new(store, analyzer, insights, CancellationToken::new()),
        )
    }

    fn snapshot(url: &str, content: &str) -> PageSnapshot {
        PageSnapshot {
            title: "Page".to_string(),
            url: url.to_string(),
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn internal_urls_are_skipped() {
        let (_dir, coordinator) = coordinator();
        let captured = coordinator
            .capture_tab(snapshot("chrome://settings", "irrelevant"))
            .await
            .expect("capture");
        assert!(captured.is_none());
    }

    #[tokio::test]
    async fn captured_page_carries_heuristic_analysis() {
        let (_dir, coordinator) = coordinator();
        let captured = coordinator
            .capture_tab(snapshot(
                "https://example.com/cities",
                "<main>Paris is beautiful. London is bigger than Paris.</main>",
            ))
            .await
            .expect("capture")
            .expect("not skipped");

        assert_eq!(captured.entities[0].entity, "paris");
        assert_eq!(captured.entities[0].count, 2);
        assert_eq!(
            captured.raw_content,
            "Paris is beautiful. London is bigger than Paris."
        );
    }

    #[tokio::test]
    async fn unextractable_content_still_stores_a_record() {
        let (_dir, coordinator) = coordinator();
        let captured = coordinator
            .capture_tab(snapshot("https://example.com/blank", "   "))
            .await
            .expect("capture")
            .expect("not skipped");

        assert!(captured.raw_content.is_empty());
        assert!(captured.entities.is_empty());
        assert!(captured.claims.is_empty());
    }

    #[tokio::test]
    async fn one_bad_tab_does_not_abort_the_batch() {
        let (_dir, coordinator) = coordinator();
        let stored = coordinator
            .capture_many(vec![
                snapshot("chrome://skip-me", "x"),
                snapshot("https://example.com/good", "Some page body text here."),
            ])
            .await;

        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].url, "https://example.com/good");
    }

    #[tokio::test]
    async fn refresh_rewrites_derived_fields_in_place() {
        let (_dir, coordinator) = coordinator();
        coordinator
            .capture_tab(snapshot(
                "https://example.com/a",
                "Berlin has museums. Berlin has parks and Rivers too.",
            ))
            .await
            .expect("capture");

        let before = coordinator.store.list().await.expect("list");
        coordinator.refresh_analysis().await.expect("refresh");
        let after = coordinator.store.list().await.expect("list");

        assert_eq!(after.len(), 1);
        assert_eq!(after[0].captured_at, before[0].captured_at);
        assert!(after[0].processed_at >= before[0].processed_at);
        assert_eq!(after[0].entities, before[0].entities);
    }
}
