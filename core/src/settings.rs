//! Operator-tunable AI feature settings, fetched from the storefront with a
//! short-lived cache and hardcoded defaults when the source is unavailable.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const SETTINGS_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_provider_priority")]
    pub provider_priority: Vec<String>,
    #[serde(default = "default_persona_name")]
    pub persona_name: String,
    #[serde(default = "default_greeting")]
    pub greeting: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_recommendations() -> usize {
    5
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_provider_priority() -> Vec<String> {
    vec!["fast".to_string(), "fallback".to_string()]
}

fn default_persona_name() -> String {
    "Prorab".to_string()
}

fn default_greeting() -> String {
    "Hi! I'm the store assistant. Tell me what you are building and I'll help you pick the right materials and tools.".to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful, honest shopping assistant for a construction goods store.".to_string()
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_recommendations: default_max_recommendations(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            provider_priority: default_provider_priority(),
            persona_name: default_persona_name(),
            greeting: default_greeting(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_ai_settings(&self) -> anyhow::Result<AiSettings>;
}

pub struct SettingsCache {
    store: Option<Arc<dyn SettingsStore>>,
    cache: Mutex<Option<(Instant, AiSettings)>>,
}

impl SettingsCache {
    pub fn new(store: Option<Arc<dyn SettingsStore>>) -> Self {
        Self {
            store,
            cache: Mutex::new(None),
        }
    }

    /// Current settings; never fails. A fetch error logs a warning and
    /// serves the defaults.
    pub async fn current(&self) -> AiSettings {
        {
            let cache = self.cache.lock().unwrap();
            if let Some((at, settings)) = cache.as_ref() {
                if at.elapsed() < SETTINGS_TTL {
                    return settings.clone();
                }
            }
        }

        let Some(store) = self.store.as_ref() else {
            return AiSettings::default();
        };

        let settings = match store.get_ai_settings().await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(
                    target: "prorab.reco",
                    stage = "settings.fetch_failed",
                    error = %e,
                    "serving default AI settings"
                );
                AiSettings::default()
            }
        };

        let mut cache = self.cache.lock().unwrap();
        *cache = Some((Instant::now(), settings.clone()));
        settings
    }

    pub fn invalidate(&self) {
        *self.cache.lock().unwrap() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyStore {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl SettingsStore for FlakyStore {
        async fn get_ai_settings(&self) -> anyhow::Result<AiSettings> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("storefront unavailable")
        }
    }

    #[tokio::test]
    async fn defaults_without_store() {
        let cache = SettingsCache::new(None);
        let s = cache.current().await;
        assert!(s.enabled);
        assert_eq!(s.max_recommendations, 5);
    }

    #[tokio::test]
    async fn fetch_failure_degrades_to_defaults() {
        let store = Arc::new(FlakyStore {
            fetches: AtomicUsize::new(0),
        });
        let cache = SettingsCache::new(Some(store.clone()));
        let s = cache.current().await;
        assert_eq!(s.persona_name, "Prorab");
        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: AiSettings = serde_json::from_str(r#"{"maxRecommendations": 3}"#).unwrap();
        assert_eq!(s.max_recommendations, 3);
        assert!(s.enabled);
        assert_eq!(s.provider_priority, vec!["fast", "fallback"]);
    }
}
