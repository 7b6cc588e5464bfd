use std::sync::Arc;

use prorab_core::api as core_api;

use crate::provider::{FallbackProvider, FastProvider};
use crate::storefront::StorefrontClient;

/// Wires the real collaborators: both inference providers against the key
/// pool, and one storefront client shared across every storefront-facing
/// trait.
pub struct DefaultServicesFactory;

#[async_trait::async_trait]
impl core_api::ServicesFactory for DefaultServicesFactory {
    async fn build_services(
        &self,
        cfg: &core_api::AppConfig,
        pool: Arc<core_api::KeyPool>,
    ) -> Result<core_api::Services, core_api::EngineError> {
        let defaults = core_api::AiSettings::default();

        let fast = FastProvider::new(
            pool.clone(),
            &cfg.llm.fast,
            defaults.temperature,
            defaults.max_tokens,
        )
        .map_err(|err| core_api::EngineError::Config(err.to_string()))?;
        let fallback = FallbackProvider::new(
            pool,
            &cfg.llm.fallback,
            defaults.temperature,
            defaults.max_tokens,
        )
        .map_err(|err| core_api::EngineError::Config(err.to_string()))?;

        let storefront = Arc::new(
            StorefrontClient::new(
                cfg.storefront.base_url.clone(),
                cfg.storefront.api_key.clone(),
                cfg.storefront.timeout_ms,
            )
            .map_err(|err| core_api::EngineError::Config(err.to_string()))?,
        );

        Ok(core_api::Services {
            callers: vec![Arc::new(fast), Arc::new(fallback)],
            catalog: storefront.clone(),
            requests: storefront.clone(),
            prompts: Some(storefront.clone()),
            settings: Some(storefront.clone()),
            keys: Some(storefront),
        })
    }
}
