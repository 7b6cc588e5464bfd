//! Prompt templates: compiled-in defaults overlaid by operator-editable
//! overrides from the storefront admin, resolved through a short-lived cache.

pub mod defaults;
mod registry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use defaults::{default_prompts, GENERAL_CHAT, INTENT_ANALYSIS, MISSING_ITEM, PRODUCT_RANKING};
pub use registry::{render_template, PromptRegistry, OVERRIDE_TTL};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub template: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl PromptTemplate {
    pub fn builtin(id: &str, name: &str, description: &str, template: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            template: template.to_string(),
            active: true,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Operator-edited overrides, fetched from the storefront admin store.
#[async_trait]
pub trait PromptStore: Send + Sync {
    async fn get_ai_prompts(&self) -> anyhow::Result<Vec<PromptTemplate>>;
}
