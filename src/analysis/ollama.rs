//! Ollama-backed analysis provider.
//!
//! Talks to a local Ollama server over HTTP. Every failure mode here
//! (server down, timeout, non-JSON reply) surfaces as an analysis or chat
//! error and is absorbed by the resilient wrapper or the orchestrator;
//! nothing in the engine assumes this provider is reachable.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{AnalysisProvider, ChatRequest, InsightDraft, ProgressSink};
use crate::error::{EngineError, EngineResult};
use crate::models::{
    AnalyzedPage, ChatPhase, Claim, ContentType, EntityMention, Intent, PageAnalysis, PageInput,
    Role, Stance,
};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_MODEL: &str = "llama3.2";
const MAX_PROMPT_CONTENT_CHARS: usize = 4_000;

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: WireMessage,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

/// Shape the model is prompted to return for page analysis.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default)]
    entities: Vec<RawEntity>,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    claims: Vec<RawClaim>,
    intent: Option<String>,
    content_type: Option<String>,
}

#[derive(Deserialize)]
struct RawEntity {
    entity: String,
    #[serde(default = "one")]
    count: u32,
}

#[derive(Deserialize)]
struct RawClaim {
    claim: String,
    #[serde(default = "half")]
    confidence: f64,
    #[serde(default)]
    stance: Option<String>,
}

fn one() -> u32 {
    1
}

fn half() -> f64 {
    0.5
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInsight {
    activity: String,
    #[serde(default)]
    connections: Vec<String>,
    #[serde(default)]
    insight: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// Reads `PAGESENSE_OLLAMA_URL` / `PAGESENSE_OLLAMA_MODEL`, with
    /// local-server defaults.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("PAGESENSE_OLLAMA_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model =
            std::env::var("PAGESENSE_OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(base_url, model)
    }

    async fn generate_json(&self, prompt: String) -> EngineResult<String> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "format": "json",
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|err| EngineError::Analysis(format!("ollama request failed: {err}")))?
            .error_for_status()
            .map_err(|err| EngineError::Analysis(format!("ollama rejected request: {err}")))?;

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|err| EngineError::Analysis(format!("malformed ollama response: {err}")))?;
        Ok(parsed.response)
    }
}

#[async_trait]
impl AnalysisProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn analyze(&self, input: &PageInput) -> EngineResult<PageAnalysis> {
        let content: String = input
            .raw_content
            .chars()
            .take(MAX_PROMPT_CONTENT_CHARS)
            .collect();
        let prompt = format!(
            "Analyze this web page and reply with JSON only, using the shape \
             {{\"entities\":[{{\"entity\":string,\"count\":number}}],\"topics\":[string],\
             \"claims\":[{{\"claim\":string,\"confidence\":number,\"stance\":\"positive\"|\"neutral\"}}],\
             \"intent\":\"studying\"|\"shopping\"|\"researching\"|\"browsing\",\
             \"contentType\":\"article\"|\"video\"|\"documentation\"|\"product\"}}.\n\
             Title: {}\nURL: {}\nContent:\n{}",
            input.title, input.url, content
        );

        let raw = self.generate_json(prompt).await?;
        let parsed: RawAnalysis = serde_json::from_str(&raw)
            .map_err(|err| EngineError::Analysis(format!("unparseable analysis JSON: {err}")))?;

        Ok(PageAnalysis {
            entities: parsed
                .entities
                .into_iter()
                .map(|e| EntityMention {
                    entity: e.entity.to_lowercase(),
                    count: e.count,
                })
                .collect(),
            topics: parsed.topics,
            intent: parse_intent(parsed.intent.as_deref()),
            content_type: parse_content_type(parsed.content_type.as_deref()),
            claims: parsed
                .claims
                .into_iter()
                .map(|c| Claim {
                    id: uuid::Uuid::new_v4().to_string(),
                    claim: c.claim,
                    confidence: c.confidence.clamp(0.0, 1.0),
                    stance: match c.stance.as_deref() {
                        Some("positive") => Stance::Positive,
                        _ => Stance::Neutral,
                    },
                })
                .collect(),
        })
    }

    async fn chat(
        &self,
        request: ChatRequest<'_>,
        progress: &ProgressSink,
    ) -> EngineResult<String> {
        let mut messages: Vec<WireMessage> = Vec::new();

        if let Some(context) = request.context {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: format!(
                    "The user is looking at \"{}\" ({}). Topics: {}. Summary: {}",
                    context.title,
                    context.url,
                    context.main_topics.join(", "),
                    context.summary
                ),
            });
        }
        for message in request.history {
            messages.push(WireMessage {
                role: match message.role {
                    Role::User => "user".to_string(),
                    Role::Assistant => "assistant".to_string(),
                },
                content: message.content.clone(),
            });
        }
        messages.push(WireMessage {
            role: "user".to_string(),
            content: request.message.to_string(),
        });

        progress(ChatPhase::Reasoning);

        let body = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|err| EngineError::Chat(format!("ollama chat failed: {err}")))?
            .error_for_status()
            .map_err(|err| EngineError::Chat(format!("ollama rejected chat: {err}")))?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| EngineError::Chat(format!("malformed chat response: {err}")))?;
        Ok(parsed.message.content)
    }

    async fn synthesize_insight(&self, pages: &[AnalyzedPage]) -> EngineResult<InsightDraft> {
        let digest: Vec<String> = pages
            .iter()
            .map(|page| {
                format!(
                    "- {} ({}) topics: {}",
                    page.title,
                    page.url,
                    page.topics.join(", ")
                )
            })
            .collect();
        let prompt = format!(
            "These pages are open in the user's browser:\n{}\n\
             Reply with JSON only: {{\"activity\":string,\"connections\":[string],\"insight\":string}} \
             describing what the user appears to be doing across tabs.",
            digest.join("\n")
        );

        let raw = self.generate_json(prompt).await?;
        let parsed: RawInsight = serde_json::from_str(&raw)
            .map_err(|err| EngineError::Analysis(format!("unparseable insight JSON: {err}")))?;

        Ok(InsightDraft {
            activity: parsed.activity,
            connections: parsed.connections,
            insight: parsed.insight,
        })
    }
}

fn parse_intent(raw: Option<&str>) -> Intent {
    match raw {
        Some("studying") => Intent::Studying,
        Some("shopping") => Intent::Shopping,
        Some("researching") => Intent::Researching,
        _ => Intent::Browsing,
    }
}

fn parse_content_type(raw: Option<&str>) -> ContentType {
    match raw {
        Some("video") => ContentType::Video,
        Some("documentation") => ContentType::Documentation,
        Some("product") => ContentType::Product,
        _ => ContentType::Article,
    }
}
