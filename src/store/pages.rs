//! Bounded, URL-keyed store of analyzed pages.
//!
//! The whole list lives under one storage key because capacity eviction
//! is store-wide; every mutation is a read-modify-write transaction on
//! that key through the mutation queue, so concurrent tab captures never
//! lose each other's updates.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::db::{keys, Database, StorageArea};
use crate::error::EngineResult;
use crate::models::AnalyzedPage;
use crate::queue::KeyedMutationQueue;

pub const MAX_PAGES: usize = 50;

#[derive(Clone)]
pub struct PageStore {
    db: Database,
    queue: Arc<KeyedMutationQueue>,
}

impl PageStore {
    pub fn new(db: Database, queue: Arc<KeyedMutationQueue>) -> Self {
        Self { db, queue }
    }

    /// Upsert by URL. A re-captured URL is replaced in place, keeping the
    /// position it holds at replacement time; a new URL is appended. The
    /// store then evicts oldest entries (by capture time) down to
    /// `MAX_PAGES`.
    pub async fn capture(&self, page: AnalyzedPage) -> EngineResult<AnalyzedPage> {
        self.queue
            .with_lock(keys::CAPTURED_PAGES, move || async move {
                let mut pages = self.load().await?;

                match pages.iter_mut().find(|existing| existing.url == page.url) {
                    Some(existing) => *existing = page.clone(),
                    None => pages.push_back(page.clone()),
                }

                while pages.len() > MAX_PAGES {
                    let oldest = pages
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, p)| p.captured_at)
                        .map(|(index, _)| index);
                    match oldest {
                        Some(index) => {
                            pages.remove(index);
                        }
                        None => break,
                    }
                }

                self.db
                    .put_json(StorageArea::Durable, keys::CAPTURED_PAGES, &pages)
                    .await?;
                Ok(page)
            })
            .await
    }

    /// Snapshot in insertion order.
    pub async fn list(&self) -> EngineResult<Vec<AnalyzedPage>> {
        Ok(self.load().await?.into_iter().collect())
    }

    pub async fn find_by_url(&self, url: &str) -> EngineResult<Option<AnalyzedPage>> {
        Ok(self.load().await?.into_iter().find(|page| page.url == url))
    }

    /// Look up pages by URL, in the order given; unknown ids are dropped.
    pub async fn resolve(&self, ids: &[String]) -> EngineResult<Vec<AnalyzedPage>> {
        let pages = self.load().await?;
        Ok(ids
            .iter()
            .filter_map(|id| pages.iter().find(|page| &page.url == id).cloned())
            .collect())
    }

    /// Empties the store and the derived insight singleton.
    pub async fn clear(&self) -> EngineResult<()> {
        self.queue
            .with_lock(keys::CAPTURED_PAGES, move || async move {
                self.db
                    .remove(StorageArea::Durable, keys::CAPTURED_PAGES)
                    .await?;
                Ok::<_, crate::error::EngineError>(())
            })
            .await?;
        self.queue
            .with_lock(keys::CONTEXTUAL_INSIGHTS, move || async move {
                self.db
                    .remove(StorageArea::Durable, keys::CONTEXTUAL_INSIGHTS)
                    .await?;
                Ok::<_, crate::error::EngineError>(())
            })
            .await?;
        Ok(())
    }

    async fn load(&self) -> EngineResult<VecDeque<AnalyzedPage>> {
        Ok(self
            .db
            .get_json(StorageArea::Durable, keys::CAPTURED_PAGES)
            .await?
            .unwrap_or_default())
    }
}
