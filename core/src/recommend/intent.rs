//! Intent extraction: one structured LLM call over the query, the category
//! list and the conversation history.

use crate::catalog::Category;
use crate::error::LlmError;
use crate::llm::LlmRouter;
use crate::prompts::{PromptRegistry, INTENT_ANALYSIS};

use super::types::{render_history, ChatMessage, IntentAnalysis};

pub async fn analyze_intent(
    router: &LlmRouter,
    prompts: &PromptRegistry,
    query: &str,
    categories: &[Category],
    history: &[ChatMessage],
) -> Result<IntentAnalysis, LlmError> {
    let prompt = prompts
        .get_prompt(
            INTENT_ANALYSIS,
            &[
                ("categories", render_categories(categories)),
                ("history", render_history(history)),
                ("query", query.to_string()),
            ],
        )
        .await?;

    let intent: IntentAnalysis = router.complete_json(&prompt, None).await?;
    tracing::debug!(
        target: "prorab.reco",
        stage = "intent.out",
        category = intent.category_id.as_deref().unwrap_or("-"),
        general_chat = intent.is_general_chat,
        unavailable = intent.unavailable_item.is_some(),
        confidence = intent.confidence,
    );
    Ok(intent)
}

fn render_categories(categories: &[Category]) -> String {
    if categories.is_empty() {
        return "(no categories)".to_string();
    }
    categories
        .iter()
        .map(|c| match &c.parent_id {
            Some(parent) => format!("- {} (id: {}, subcategory of {})", c.name, c.id, parent),
            None => format!("- {} (id: {})", c.name, c.id),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
