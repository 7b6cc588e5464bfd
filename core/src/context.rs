use crate::catalog::{CatalogPlugin, RequestSink};
use crate::config::AppConfig;
use crate::error::EngineError;
use crate::keypool::{DynamicKey, KeyPool};
use crate::llm::ProviderCaller;
use crate::prompts::PromptStore;
use crate::settings::SettingsStore;
use std::sync::Arc;

/// Source of operator-managed API keys, fetched at runtime and merged with
/// the env-seeded keys in the pool.
#[async_trait::async_trait]
pub trait KeySource: Send + Sync {
    async fn get_api_keys(&self) -> anyhow::Result<Vec<DynamicKey>>;
}

#[derive(Clone)]
pub struct Services {
    pub callers: Vec<Arc<dyn ProviderCaller>>,
    pub catalog: Arc<dyn CatalogPlugin>,
    pub requests: Arc<dyn RequestSink>,
    pub prompts: Option<Arc<dyn PromptStore>>,
    pub settings: Option<Arc<dyn SettingsStore>>,
    pub keys: Option<Arc<dyn KeySource>>,
}

#[async_trait::async_trait]
pub trait ServicesFactory: Send + Sync {
    async fn build_services(
        &self,
        cfg: &AppConfig,
        pool: Arc<KeyPool>,
    ) -> Result<Services, EngineError>;
}

#[derive(Clone)]
pub struct AppContext {
    cfg: AppConfig,
    pool: Arc<KeyPool>,
    services_factory: Option<Arc<dyn ServicesFactory>>,
}

impl AppContext {
    pub fn new(cfg: AppConfig, services_factory: Option<Arc<dyn ServicesFactory>>) -> Self {
        let pool = Arc::new(KeyPool::new());
        let seeded = pool.initialize_from_env();
        tracing::info!(target: "prorab.keys", stage = "env_seed", keys = seeded);
        Self {
            cfg,
            pool,
            services_factory,
        }
    }

    pub fn cfg(&self) -> &AppConfig {
        &self.cfg
    }

    pub fn pool(&self) -> &Arc<KeyPool> {
        &self.pool
    }

    pub fn with_config(&self, cfg: AppConfig) -> Self {
        Self {
            cfg,
            pool: self.pool.clone(),
            services_factory: self.services_factory.clone(),
        }
    }

    pub async fn build_services(&self) -> Result<Services, EngineError> {
        let Some(factory) = self.services_factory.as_ref() else {
            return Err(EngineError::Config(
                "services_factory missing (cannot build providers/storefront)".into(),
            ));
        };
        factory.build_services(&self.cfg, self.pool.clone()).await
    }

    /// Merge operator-managed keys into the pool when the refresh window
    /// has elapsed. Called opportunistically at the start of a request;
    /// failures keep the previous key set.
    pub async fn refresh_dynamic_keys(&self, source: &Arc<dyn KeySource>) {
        if !self.pool.needs_refresh() {
            return;
        }
        match source.get_api_keys().await {
            Ok(keys) => {
                let changed = self.pool.load_dynamic_keys(keys);
                if changed {
                    tracing::info!(target: "prorab.keys", stage = "dynamic_reload");
                }
            }
            Err(err) => {
                tracing::warn!(
                    target: "prorab.keys",
                    stage = "dynamic_reload_failed",
                    error = %err,
                );
            }
        }
    }
}
