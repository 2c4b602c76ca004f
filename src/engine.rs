//! Engine assembly and action dispatch.
//!
//! One `Engine` per process owns the database, the mutation queue and
//! every component built on them, and is handed to whatever transport
//! feeds it actions. Handlers never panic the process: storage failures
//! come back as `{success: false, error}` responses.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::actions::{Action, ActionResponse};
use crate::analysis::{AnalysisProvider, ResilientAnalyzer};
use crate::capture::{CaptureCoordinator, PageSnapshot};
use crate::chat::{ChatOrchestrator, ChatTurn};
use crate::db::Database;
use crate::error::EngineResult;
use crate::events::{EngineEvent, EventBus};
use crate::insight::{compare_pages, CrossTabInsightEngine};
use crate::queue::KeyedMutationQueue;
use crate::store::{ConversationCache, PageStore};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

const DB_FILE: &str = "pagesense.sqlite3";

pub struct Engine {
    store: PageStore,
    conversations: ConversationCache,
    insights: Arc<CrossTabInsightEngine>,
    capture: CaptureCoordinator,
    chat: ChatOrchestrator,
    events: EventBus,
    shutdown: CancellationToken,
}

impl Engine {
    /// Open (or create) the engine state under `data_dir` and wire every
    /// component to the shared database, queue and event bus.
    pub fn open(
        data_dir: impl AsRef<Path>,
        provider: Option<Arc<dyn AnalysisProvider>>,
    ) -> EngineResult<Self> {
        let db = Database::new(data_dir.as_ref().join(DB_FILE))?;
        let queue = Arc::new(KeyedMutationQueue::new());
        let analyzer = Arc::new(ResilientAnalyzer::new(provider));
        let events = EventBus::new();
        let shutdown = CancellationToken::new();

        let store = PageStore::new(db.clone(), Arc::clone(&queue));
        let conversations = ConversationCache::new(db.clone(), Arc::clone(&queue));
        let insights = Arc::new(CrossTabInsightEngine::new(
            db,
            Arc::clone(&queue),
            Arc::clone(&analyzer),
            events.clone(),
        ));
        let capture = CaptureCoordinator::new(
            store.clone(),
            Arc::clone(&analyzer),
            Arc::clone(&insights),
            shutdown.clone(),
        );
        let chat = ChatOrchestrator::new(
            conversations.clone(),
            store.clone(),
            analyzer,
            events.clone(),
        );

        log_info!("engine opened at {}", data_dir.as_ref().display());
        Ok(Self {
            store,
            conversations,
            insights,
            capture,
            chat,
            events,
            shutdown,
        })
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Route one action to its handler. Never returns an error; failures
    /// are rendered into the response shape.
    pub async fn dispatch(&self, action: Action) -> ActionResponse {
        match action {
            Action::CapturePage {
                title,
                url,
                content,
            } => self.handle_capture_page(title, url, content).await,
            Action::GetCapturedPages => self.handle_get_captured_pages().await,
            Action::ComparePages { page_ids } => self.handle_compare_pages(page_ids).await,
            Action::Chat {
                message,
                tab_id,
                include_context,
                current_url,
            } => {
                self.handle_chat(message, tab_id, include_context, current_url)
                    .await
            }
            Action::GetChatHistory { tab_id } => self.handle_get_chat_history(&tab_id).await,
            Action::ClearChatHistory { tab_id } => self.handle_clear_chat_history(&tab_id).await,
            Action::RefreshAnalysis => self.handle_refresh_analysis().await,
        }
    }

    async fn handle_capture_page(
        &self,
        title: String,
        url: String,
        content: String,
    ) -> ActionResponse {
        let snapshot = PageSnapshot {
            title,
            url,
            content,
        };
        match self.capture.capture_tab(snapshot).await {
            Ok(data) => ActionResponse::Captured {
                success: true,
                data,
            },
            Err(err) => {
                log_warn!("capturePage failed: {err}");
                ActionResponse::failure(err)
            }
        }
    }

    async fn handle_get_captured_pages(&self) -> ActionResponse {
        match self.store.list().await {
            Ok(pages) => ActionResponse::Pages { pages },
            Err(err) => {
                log_warn!("getCapturedPages failed: {err}");
                ActionResponse::failure(err)
            }
        }
    }

    async fn handle_compare_pages(&self, page_ids: Vec<String>) -> ActionResponse {
        let resolved = match self.store.resolve(&page_ids).await {
            Ok(pages) => pages,
            Err(err) => {
                log_warn!("comparePages failed to resolve: {err}");
                return ActionResponse::failure(err);
            }
        };
        match compare_pages(&resolved) {
            Ok(comparison) => ActionResponse::Comparison {
                success: true,
                comparison,
            },
            Err(err) => ActionResponse::failure(err),
        }
    }

    async fn handle_chat(
        &self,
        message: String,
        tab_id: String,
        include_context: bool,
        current_url: Option<String>,
    ) -> ActionResponse {
        let turn = ChatTurn {
            message,
            conversation_id: tab_id,
            include_context,
            current_url,
        };
        match self.chat.run_turn(turn).await {
            Ok(reply) => ActionResponse::Chat(reply),
            Err(err) => {
                log_warn!("chat turn failed on storage: {err}");
                ActionResponse::failure(err)
            }
        }
    }

    async fn handle_get_chat_history(&self, tab_id: &str) -> ActionResponse {
        match self.conversations.history(tab_id).await {
            Ok(history) => ActionResponse::History { history },
            Err(err) => {
                log_warn!("getChatHistory failed: {err}");
                ActionResponse::failure(err)
            }
        }
    }

    async fn handle_clear_chat_history(&self, tab_id: &str) -> ActionResponse {
        match self.conversations.clear(tab_id).await {
            Ok(()) => ActionResponse::ack(),
            Err(err) => {
                log_warn!("clearChatHistory failed: {err}");
                ActionResponse::failure(err)
            }
        }
    }

    async fn handle_refresh_analysis(&self) -> ActionResponse {
        match self.capture.refresh_analysis().await {
            Ok(()) => ActionResponse::ack(),
            Err(err) => {
                log_warn!("refreshAnalysis failed: {err}");
                ActionResponse::failure(err)
            }
        }
    }

    /// Latest cross-tab insight, for transports that poll instead of
    /// subscribing to the event bus.
    pub async fn current_insight(&self) -> EngineResult<crate::models::Insight> {
        self.insights.current().await
    }

    /// Host-suspend teardown: stop background recomputation and drop the
    /// session storage area. Durable state survives for the next start.
    pub async fn suspend(&self) -> EngineResult<()> {
        self.shutdown.cancel();
        self.conversations.clear_all().await?;
        log_info!("engine suspended, session state cleared");
        Ok(())
    }
}
