//! Small talk. Greetings and general questions get a persona reply instead
//! of a product search.

use crate::llm::LlmRouter;
use crate::prompts::{PromptRegistry, GENERAL_CHAT};
use crate::settings::AiSettings;

use super::types::{ChatMessage, render_history};

/// Produce a conversational reply. On any LLM failure we fall back to the
/// configured greeting so the widget never shows an error for small talk.
pub async fn respond_chitchat(
    router: &LlmRouter,
    prompts: &PromptRegistry,
    settings: &AiSettings,
    query: &str,
    history: &[ChatMessage],
) -> String {
    let prompt = match prompts
        .get_prompt(
            GENERAL_CHAT,
            &[
                ("system_prompt", settings.system_prompt.clone()),
                ("persona", settings.persona_name.clone()),
                ("history", render_history(history)),
                ("query", query.to_string()),
            ],
        )
        .await
    {
        Ok(p) => p,
        Err(err) => {
            tracing::warn!(
                target: "prorab.reco",
                stage = "chat.prompt_error",
                error = %err,
            );
            return settings.greeting.clone();
        }
    };

    match router.complete(&prompt, None).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => settings.greeting.clone(),
        Err(err) => {
            tracing::warn!(
                target: "prorab.reco",
                stage = "chat.llm_error",
                error = %err,
            );
            settings.greeting.clone()
        }
    }
}
