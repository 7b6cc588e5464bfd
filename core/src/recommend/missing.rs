//! Missing-item flow. When the shopper asks for something the catalog does
//! not carry we either gather details and file a product request, or ask a
//! follow-up question. LLM failures degrade to a canned follow-up question,
//! never to a request error.

use serde::Deserialize;

use crate::catalog::ProductRequestPayload;
use crate::llm::LlmRouter;
use crate::prompts::{PromptRegistry, MISSING_ITEM};

use super::types::{ChatMessage, IntentAnalysis, render_history};

#[derive(Debug)]
pub enum MissingItemAction {
    /// Enough detail gathered. File the request and confirm to the shopper.
    Request {
        payload: ProductRequestPayload,
        message: String,
    },
    /// Not enough detail yet. Ask and wait for the next turn.
    AskDetails { question: String },
}

/// Mirrors the JSON the missing-item template asks for: an "action"
/// discriminant plus the request fields when action is "request".
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct MissingItemDecision {
    action: String,
    name: String,
    probable_category: Option<String>,
    max_budget: Option<serde_json::Value>,
    specifications: Vec<String>,
    message: String,
}

/// Decide the next step of the missing-item conversation.
pub async fn resolve_missing_item(
    router: &LlmRouter,
    prompts: &PromptRegistry,
    query: &str,
    intent: &IntentAnalysis,
    history: &[ChatMessage],
) -> MissingItemAction {
    let prompt = match prompts
        .get_prompt(
            MISSING_ITEM,
            &[
                ("query", query.to_string()),
                (
                    "intent",
                    serde_json::to_string_pretty(intent).unwrap_or_else(|_| "{}".to_string()),
                ),
                ("history", render_history(history)),
            ],
        )
        .await
    {
        Ok(p) => p,
        Err(err) => {
            tracing::warn!(
                target: "prorab.reco",
                stage = "missing.prompt_error",
                error = %err,
            );
            return fallback_question(intent);
        }
    };

    let decision: MissingItemDecision = match router.complete_json(&prompt, None).await {
        Ok(d) => d,
        Err(err) => {
            tracing::warn!(
                target: "prorab.reco",
                stage = "missing.llm_error",
                error = %err,
            );
            return fallback_question(intent);
        }
    };

    if decision.action == "request" && !decision.name.trim().is_empty() {
        let mut description = decision.specifications.join("; ");
        if let Some(category) = decision
            .probable_category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
        {
            if description.is_empty() {
                description = format!("probable category: {category}");
            } else {
                description = format!("{description}; probable category: {category}");
            }
        }
        let payload = ProductRequestPayload {
            product_name: decision.name,
            brand: None,
            description: non_empty(description),
            min_price: None,
            max_price: Some(coerce_budget(decision.max_budget)),
            image_url: None,
            contact_info: None,
        };
        let message = if decision.message.trim().is_empty() {
            String::from(
                "Got it, I've passed your request to our purchasing team. \
                 We'll stock it if enough customers ask.",
            )
        } else {
            decision.message
        };
        return MissingItemAction::Request { payload, message };
    }

    if decision.message.trim().is_empty() {
        fallback_question(intent)
    } else {
        MissingItemAction::AskDetails {
            question: decision.message,
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Models sometimes emit budgets as strings ("1500", "about 2000 rub") or
/// null. Anything non-numeric collapses to zero.
pub fn coerce_budget(value: Option<serde_json::Value>) -> f64 {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => {
            let digits: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.')
                .collect();
            digits.parse().unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

fn fallback_question(intent: &IntentAnalysis) -> MissingItemAction {
    let name = intent
        .unavailable_item
        .as_ref()
        .map(|u| u.name.clone())
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "that item".to_string());
    MissingItemAction::AskDetails {
        question: format!(
            "We don't seem to carry {name} right now. Could you tell me the \
             brand or model you need and your budget? I'll file a stocking \
             request for you."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::types::UnavailableItem;

    #[test]
    fn coerce_budget_handles_shapes() {
        assert_eq!(coerce_budget(Some(serde_json::json!(1500))), 1500.0);
        assert_eq!(coerce_budget(Some(serde_json::json!("2000"))), 2000.0);
        assert_eq!(
            coerce_budget(Some(serde_json::json!("about 2500 rub"))),
            2500.0
        );
        assert_eq!(coerce_budget(Some(serde_json::json!("n/a"))), 0.0);
        assert_eq!(coerce_budget(Some(serde_json::Value::Null)), 0.0);
        assert_eq!(coerce_budget(None), 0.0);
    }

    #[test]
    fn fallback_question_names_the_item() {
        let intent = IntentAnalysis {
            unavailable_item: Some(UnavailableItem {
                name: "laser level".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let MissingItemAction::AskDetails { question } = fallback_question(&intent) else {
            panic!("expected a follow-up question");
        };
        assert!(question.contains("laser level"));
    }

    #[test]
    fn decision_parses_camel_case() {
        let d: MissingItemDecision = serde_json::from_str(
            r#"{"action":"request","name":"laser level","probableCategory":"measuring","maxBudget":"3000","specifications":["self-leveling"],"message":"Logged it"}"#,
        )
        .unwrap();
        assert_eq!(d.action, "request");
        assert_eq!(coerce_budget(d.max_budget), 3000.0);
        assert_eq!(d.specifications.len(), 1);
    }
}
