//! Cross-tab insight model: a process-wide summary of what the captured
//! pages collectively suggest the user is doing. Only the latest value is
//! kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub activity: String,
    pub connections: Vec<String>,
    pub insight: String,
    pub updated_at: DateTime<Utc>,
}

impl Insight {
    /// Value reported before any recomputation has run.
    pub fn initial() -> Self {
        Self {
            activity: "browsing".to_string(),
            connections: Vec::new(),
            insight: String::new(),
            updated_at: Utc::now(),
        }
    }
}
