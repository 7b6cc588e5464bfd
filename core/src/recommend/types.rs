use serde::{Deserialize, Serialize};

use crate::catalog::Product;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

/// Structured result of interpreting one user query. Parsed verbatim from
/// the model; category ids are NOT re-validated here, callers must re-check
/// them before querying the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentAnalysis {
    pub category_id: Option<String>,
    pub subcategory_id: Option<String>,
    pub requirements: Vec<String>,
    pub budget: Budget,
    pub preferences: Vec<String>,
    pub use_case: String,
    pub confidence: f64,
    /// When true, category/subcategory/requirements are meaningless and must
    /// not drive catalog queries.
    pub is_general_chat: bool,
    pub unavailable_item: Option<UnavailableItem>,
}

/// Nested "wants something we don't stock" payload. `max_budget` stays a raw
/// JSON value here; models occasionally return strings or nonsense, and the
/// missing-item handler owns the numeric coercion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UnavailableItem {
    pub name: String,
    pub probable_category: Option<String>,
    pub max_budget: Option<serde_json::Value>,
    pub specifications: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductMatch {
    pub product: Product,
    /// 0-100.
    pub score: u8,
    pub highlights: Vec<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<IntentAnalysis>,
    pub recommendations: Vec<ProductMatch>,
    pub summary: String,
    pub processing_time_ms: u64,
}

impl RecommendationResponse {
    /// Failure responses carry no recommendations and no summary.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            intent: None,
            recommendations: Vec::new(),
            summary: String::new(),
            processing_time_ms: 0,
        }
    }

    pub fn answered(intent: IntentAnalysis, recommendations: Vec<ProductMatch>, summary: String) -> Self {
        Self {
            success: true,
            error: None,
            intent: Some(intent),
            recommendations,
            summary,
            processing_time_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Caller-supplied hints accompanying a request (active category page,
/// budget widget, already-shown products, missing-item flow state).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestContext {
    pub category_id: Option<String>,
    pub budget: Option<Budget>,
    pub exclude_product_ids: Vec<String>,
    /// Explicit conversation-state token: the previous assistant turn asked
    /// for missing-item details. Preferred over sniffing message text.
    pub awaiting_missing_item: Option<bool>,
}

/// The single entry point's request shape. History is supplied by the
/// caller per request; nothing is persisted across requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecommendRequest {
    pub query: String,
    pub messages: Vec<ChatMessage>,
    pub max_results: Option<usize>,
    pub context: Option<RequestContext>,
}

/// Role-tagged plain-text rendering of the history for prompt embedding.
pub fn render_history(messages: &[ChatMessage]) -> String {
    if messages.is_empty() {
        return "(no prior messages)".to_string();
    }
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_parses_with_missing_fields() {
        let intent: IntentAnalysis =
            serde_json::from_str(r#"{"categoryId":"cat-1","confidence":0.8}"#).unwrap();
        assert_eq!(intent.category_id.as_deref(), Some("cat-1"));
        assert!(!intent.is_general_chat);
        assert!(intent.requirements.is_empty());
        assert!(intent.budget.max.is_none());
    }

    #[test]
    fn unavailable_item_tolerates_string_budget() {
        let intent: IntentAnalysis = serde_json::from_str(
            r#"{"unavailableItem":{"name":"tower crane","maxBudget":"about 5000"}}"#,
        )
        .unwrap();
        let item = intent.unavailable_item.unwrap();
        assert_eq!(item.name, "tower crane");
        assert!(item.max_budget.is_some());
    }

    #[test]
    fn history_rendering() {
        let msgs = vec![
            ChatMessage::user("Need a drill"),
            ChatMessage::assistant("What will you drill into?"),
        ];
        assert_eq!(
            render_history(&msgs),
            "user: Need a drill\nassistant: What will you drill into?"
        );
        assert_eq!(render_history(&[]), "(no prior messages)");
    }

    #[test]
    fn failure_response_invariant() {
        let r = RecommendationResponse::failure("bad input");
        assert!(!r.success);
        assert!(r.recommendations.is_empty());
        assert!(r.summary.is_empty());
    }
}
