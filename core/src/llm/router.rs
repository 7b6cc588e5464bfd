use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::json_extract::extract_json;
use super::traits::ProviderCaller;
use crate::error::LlmError;
use crate::keypool::{KeyPool, Provider};

/// Appended to the prompt on the single strict retry after a JSON parse
/// failure.
const STRICT_JSON_SUFFIX: &str =
    "\n\nIMPORTANT: Respond with ONLY valid JSON. No prose, no code fences, no commentary.";

/// Orchestration facade over the ordered provider chain. The fast provider
/// is tried first when it has any configured keys; any failure there falls
/// through to the fallback provider. There is no third resort.
pub struct LlmRouter {
    pool: Arc<KeyPool>,
    callers: Vec<Arc<dyn ProviderCaller>>,
}

impl LlmRouter {
    pub fn new(pool: Arc<KeyPool>, callers: Vec<Arc<dyn ProviderCaller>>) -> Self {
        Self { pool, callers }
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    pub async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String, LlmError> {
        let mut last_err: Option<LlmError> = None;
        let last_idx = self.callers.len().saturating_sub(1);

        for (idx, caller) in self.callers.iter().enumerate() {
            let provider = caller.provider();
            // Skip a keyless provider entirely, except the last in the chain:
            // letting that one run yields the natural KeyPoolExhausted error.
            if idx < last_idx && !self.pool.has_keys(provider) {
                tracing::debug!(
                    target: "prorab.llm",
                    stage = "router.skip",
                    provider = %provider,
                    "provider has no configured keys"
                );
                continue;
            }

            match caller.complete(prompt, model).await {
                Ok(text) => {
                    tracing::debug!(
                        target: "prorab.llm",
                        stage = "router.complete",
                        provider = %provider,
                        chars = text.len(),
                    );
                    return Ok(text);
                }
                Err(e) => {
                    if idx < last_idx {
                        tracing::warn!(
                            target: "prorab.llm",
                            stage = "router.fallback",
                            provider = %provider,
                            error = %e,
                            "provider failed, falling through"
                        );
                    }
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or(LlmError::KeyPoolExhausted {
            provider: Provider::Fallback,
        }))
    }

    /// `complete`, then parse the response as JSON. On a parse failure the
    /// entire call is re-issued once with a strict-JSON instruction; a
    /// second parse failure propagates.
    pub async fn complete_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<T, LlmError> {
        let text = self.complete(prompt, model).await?;
        let first_err = match extract_json::<T>(&text) {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };

        tracing::warn!(
            target: "prorab.llm",
            stage = "router.json_retry",
            error = %first_err,
            "response was not valid JSON, retrying with strict instruction"
        );
        let strict = format!("{prompt}{STRICT_JSON_SUFFIX}");
        let text = self.complete(&strict, model).await?;
        extract_json::<T>(&text)
    }
}
