//! Analyzed page data model.
//!
//! One record per captured URL, produced by the capture pipeline and owned
//! by the page store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw input handed to analysis: what the tab gave us, before any
/// structure is derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInput {
    pub title: String,
    pub url: String,
    pub raw_content: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Stance {
    Positive,
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Intent {
    Studying,
    Shopping,
    Researching,
    Browsing,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Studying => "studying",
            Intent::Shopping => "shopping",
            Intent::Researching => "researching",
            Intent::Browsing => "browsing",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ContentType {
    Article,
    Video,
    Documentation,
    Product,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityMention {
    pub entity: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    pub id: String,
    pub claim: String,
    /// Placeholder heuristic score in [0, 1]; not a calibrated signal.
    pub confidence: f64,
    pub stance: Stance,
}

/// Structured result of analyzing one page, independent of where it came
/// from (remote provider or heuristic fallback).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnalysis {
    pub entities: Vec<EntityMention>,
    pub topics: Vec<String>,
    pub intent: Intent,
    pub content_type: ContentType,
    pub claims: Vec<Claim>,
}

impl PageAnalysis {
    /// Analysis for a page with no usable content. Stored as-is so empty
    /// pages still occupy their slot in the capture history.
    pub fn empty() -> Self {
        Self {
            entities: Vec::new(),
            topics: Vec::new(),
            intent: Intent::Browsing,
            content_type: ContentType::Article,
            claims: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedPage {
    pub url: String,
    pub title: String,
    pub raw_content: String,
    pub entities: Vec<EntityMention>,
    pub topics: Vec<String>,
    pub claims: Vec<Claim>,
    pub intent: Intent,
    pub content_type: ContentType,
    pub captured_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
}

impl AnalyzedPage {
    pub fn from_analysis(input: PageInput, analysis: PageAnalysis, now: DateTime<Utc>) -> Self {
        Self {
            url: input.url,
            title: input.title,
            raw_content: input.raw_content,
            entities: analysis.entities,
            topics: analysis.topics,
            claims: analysis.claims,
            intent: analysis.intent,
            content_type: analysis.content_type,
            captured_at: now,
            processed_at: now,
        }
    }
}
