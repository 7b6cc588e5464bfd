use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use regex::Regex;

use super::defaults::default_by_id;
use super::{PromptStore, PromptTemplate};
use crate::error::LlmError;

/// Operator overrides are re-fetched at most this often; an explicit
/// `invalidate` (admin save hook) clears the cache immediately.
pub const OVERRIDE_TTL: Duration = Duration::from_secs(60);

lazy_static! {
    static ref PLACEHOLDER_RE: Regex = Regex::new(r"\{\{(\w+)\}\}").unwrap();
}

struct CachedOverrides {
    fetched_at: Instant,
    by_id: HashMap<String, PromptTemplate>,
}

/// Merged view of built-in templates and operator overrides, with literal
/// `{{placeholder}}` substitution.
pub struct PromptRegistry {
    store: Option<Arc<dyn PromptStore>>,
    cache: Mutex<Option<CachedOverrides>>,
}

impl PromptRegistry {
    pub fn new(store: Option<Arc<dyn PromptStore>>) -> Self {
        Self {
            store,
            cache: Mutex::new(None),
        }
    }

    /// Resolve a template and substitute every `{{key}}` occurrence. An
    /// override fully replaces its default when present; a template with the
    /// active flag off is an error, not a silent skip.
    pub async fn get_prompt(
        &self,
        id: &str,
        vars: &[(&str, String)],
    ) -> Result<String, LlmError> {
        let template = self.resolve(id).await?;
        if !template.active {
            return Err(LlmError::PromptDisabled(id.to_string()));
        }
        Ok(render_template(&template.template, vars))
    }

    /// Admin-save hook: the very next resolution reflects new content.
    pub fn invalidate(&self) {
        *self.cache.lock().unwrap() = None;
        tracing::debug!(target: "prorab.llm", stage = "prompts.invalidate");
    }

    async fn resolve(&self, id: &str) -> Result<PromptTemplate, LlmError> {
        if let Some(tpl) = self.overrides().await.get(id) {
            return Ok(tpl.clone());
        }
        default_by_id(id).ok_or_else(|| LlmError::PromptNotFound(id.to_string()))
    }

    async fn overrides(&self) -> HashMap<String, PromptTemplate> {
        {
            let cache = self.cache.lock().unwrap();
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < OVERRIDE_TTL {
                    return cached.by_id.clone();
                }
            }
        }

        let Some(store) = self.store.as_ref() else {
            return HashMap::new();
        };

        // Concurrent refreshes may fetch redundantly; all converge on the
        // same source of truth, and the whole value is replaced atomically.
        let by_id = match store.get_ai_prompts().await {
            Ok(list) => list.into_iter().map(|p| (p.id.clone(), p)).collect(),
            Err(e) => {
                tracing::warn!(
                    target: "prorab.llm",
                    stage = "prompts.fetch_failed",
                    error = %e,
                    "falling back to built-in templates"
                );
                HashMap::new()
            }
        };

        let mut cache = self.cache.lock().unwrap();
        *cache = Some(CachedOverrides {
            fetched_at: Instant::now(),
            by_id: by_id.clone(),
        });
        by_id
    }
}

/// Single-pass literal substitution: every `{{name}}` token is looked up in
/// `vars`; unknown tokens are left intact. No escaping — output feeds a text
/// LLM prompt, not HTML.
pub fn render_template(template: &str, vars: &[(&str, String)]) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
