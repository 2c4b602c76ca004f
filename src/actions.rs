//! Action-keyed message protocol.
//!
//! Requests arrive as JSON tagged by `action`; each variant maps to one
//! engine handler. Responses are plain shapes per action, with storage
//! failures rendered uniformly as `{success: false, error}`.

use serde::{Deserialize, Serialize};

use crate::chat::ChatReply;
use crate::insight::PageComparison;
use crate::models::{AnalyzedPage, ConversationMessage};

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
    #[serde(rename_all = "camelCase")]
    CapturePage {
        title: String,
        url: String,
        content: String,
    },
    GetCapturedPages,
    #[serde(rename_all = "camelCase")]
    ComparePages { page_ids: Vec<String> },
    #[serde(rename_all = "camelCase")]
    Chat {
        message: String,
        tab_id: String,
        #[serde(default)]
        include_context: bool,
        #[serde(default)]
        current_url: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    GetChatHistory { tab_id: String },
    #[serde(rename_all = "camelCase")]
    ClearChatHistory { tab_id: String },
    RefreshAnalysis,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ActionResponse {
    #[serde(rename_all = "camelCase")]
    Captured {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<AnalyzedPage>,
    },
    #[serde(rename_all = "camelCase")]
    Pages { pages: Vec<AnalyzedPage> },
    #[serde(rename_all = "camelCase")]
    Comparison {
        success: bool,
        comparison: PageComparison,
    },
    Chat(ChatReply),
    #[serde(rename_all = "camelCase")]
    History { history: Vec<ConversationMessage> },
    #[serde(rename_all = "camelCase")]
    Ack { success: bool },
    #[serde(rename_all = "camelCase")]
    Failure { success: bool, error: String },
}

impl ActionResponse {
    pub fn ack() -> Self {
        ActionResponse::Ack { success: true }
    }

    pub fn failure(error: impl std::fmt::Display) -> Self {
        ActionResponse::Failure {
            success: false,
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_deserialize_from_their_wire_tags() {
        let action: Action = serde_json::from_str(
            r#"{"action":"capturePage","title":"T","url":"https://a.com","content":"<p>hi</p>"}"#,
        )
        .expect("capturePage");
        assert!(matches!(action, Action::CapturePage { .. }));

        let action: Action =
            serde_json::from_str(r#"{"action":"getCapturedPages"}"#).expect("getCapturedPages");
        assert!(matches!(action, Action::GetCapturedPages));

        let action: Action = serde_json::from_str(
            r#"{"action":"comparePages","pageIds":["https://a.com","https://b.com"]}"#,
        )
        .expect("comparePages");
        let Action::ComparePages { page_ids } = action else {
            panic!("wrong variant");
        };
        assert_eq!(page_ids.len(), 2);
    }

    #[test]
    fn chat_context_flag_defaults_to_false() {
        let action: Action =
            serde_json::from_str(r#"{"action":"chat","message":"hi","tabId":"3"}"#).expect("chat");
        let Action::Chat {
            include_context,
            current_url,
            tab_id,
            ..
        } = action
        else {
            panic!("wrong variant");
        };
        assert!(!include_context);
        assert!(current_url.is_none());
        assert_eq!(tab_id, "3");
    }

    #[test]
    fn failure_response_has_the_uniform_shape() {
        let json =
            serde_json::to_value(ActionResponse::failure("database unavailable")).expect("json");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "database unavailable");
    }

    #[test]
    fn unknown_actions_are_rejected() {
        assert!(serde_json::from_str::<Action>(r#"{"action":"selfDestruct"}"#).is_err());
    }
}
