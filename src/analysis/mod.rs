//! The analysis seam: a pluggable provider for page analysis, chat
//! completion and cross-tab insight synthesis, plus the resilient wrapper
//! that hides provider failures behind the heuristic fallback.

use std::sync::Arc;

use async_trait::async_trait;
use log::warn;

use crate::error::EngineResult;
use crate::models::{AnalyzedPage, ChatPhase, ConversationMessage, PageAnalysis, PageContextEntry, PageInput};

pub mod heuristic;
pub mod ollama;

pub use heuristic::HeuristicAnalyzer;
pub use ollama::OllamaProvider;

/// Fire-and-forget progress reporting for a chat turn. Notifications are
/// a secondary output channel; nothing depends on them being observed.
pub type ProgressSink = Arc<dyn Fn(ChatPhase) + Send + Sync>;

/// No-op sink for callers that do not surface progress.
pub fn null_progress() -> ProgressSink {
    Arc::new(|_| {})
}

/// Everything a provider needs for one chat completion.
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub history: &'a [ConversationMessage],
    pub context: Option<&'a PageContextEntry>,
}

/// Activity/connection detection result, before it is stamped and stored
/// as the insight singleton.
#[derive(Debug, Clone)]
pub struct InsightDraft {
    pub activity: String,
    pub connections: Vec<String>,
    pub insight: String,
}

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Structured analysis of one page.
    async fn analyze(&self, input: &PageInput) -> EngineResult<PageAnalysis>;

    /// Single-turn completion over history and optional page context.
    /// Implementations report intermediate states through `progress`.
    async fn chat(&self, request: ChatRequest<'_>, progress: &ProgressSink)
        -> EngineResult<String>;

    /// Aggregate activity/connection detection across captured pages.
    async fn synthesize_insight(&self, pages: &[AnalyzedPage]) -> EngineResult<InsightDraft>;
}

/// Provider-first analysis with a synchronous heuristic fallback.
///
/// `analyze` never fails: any provider error (timeout, malformed
/// response, quota) degrades to the heuristic result with the same shape.
pub struct ResilientAnalyzer {
    provider: Option<Arc<dyn AnalysisProvider>>,
    heuristic: HeuristicAnalyzer,
}

impl ResilientAnalyzer {
    pub fn new(provider: Option<Arc<dyn AnalysisProvider>>) -> Self {
        Self {
            provider,
            heuristic: HeuristicAnalyzer::new(),
        }
    }

    /// Deterministic claim scores; used by tests.
    pub fn with_seeded_heuristic(provider: Option<Arc<dyn AnalysisProvider>>, seed: u64) -> Self {
        Self {
            provider,
            heuristic: HeuristicAnalyzer::with_seed(seed),
        }
    }

    pub fn provider(&self) -> Option<&Arc<dyn AnalysisProvider>> {
        self.provider.as_ref()
    }

    pub async fn analyze(&self, input: &PageInput) -> PageAnalysis {
        if let Some(provider) = &self.provider {
            match provider.analyze(input).await {
                Ok(analysis) => return analysis,
                Err(err) => {
                    warn!(
                        "provider '{}' failed for {}, using heuristic fallback: {err}",
                        provider.name(),
                        input.url
                    );
                }
            }
        }
        self.heuristic.analyze(input)
    }

    /// Chat has no heuristic stand-in; without a reachable provider the
    /// turn fails and the orchestrator answers with the fixed apology.
    pub async fn chat(
        &self,
        request: ChatRequest<'_>,
        progress: &ProgressSink,
    ) -> EngineResult<String> {
        match &self.provider {
            Some(provider) => provider.chat(request, progress).await,
            None => Err(crate::error::EngineError::Chat(
                "no analysis provider configured".to_string(),
            )),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MockProvider;
    use super::*;

    #[tokio::test]
    async fn provider_failure_falls_back_to_heuristic_transparently() {
        let analyzer = ResilientAnalyzer::with_seeded_heuristic(
            Some(Arc::new(MockProvider { reply: None })),
            3,
        );
        let input = PageInput {
            title: "Cities".to_string(),
            url: "https://example.com/cities".to_string(),
            raw_content: "Paris is beautiful. London is bigger than Paris.".to_string(),
        };

        let analysis = analyzer.analyze(&input).await;
        assert_eq!(analysis.entities[0].entity, "paris");
        assert_eq!(analysis.entities[0].count, 2);
    }

    #[tokio::test]
    async fn chat_without_provider_is_a_chat_failure() {
        let analyzer = ResilientAnalyzer::new(None);
        let request = ChatRequest {
            message: "hi",
            history: &[],
            context: None,
        };
        let err = analyzer.chat(request, &null_progress()).await.unwrap_err();
        assert!(matches!(err, crate::error::EngineError::Chat(_)));
    }
}
