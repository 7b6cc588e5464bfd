//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `prorab_core::api` instead of reaching into internal modules.

pub use crate::catalog::{
    CatalogPlugin, Category, Product, ProductQuery, ProductRequestPayload, RequestSink,
};
pub use crate::config::{
    get_prorab_data_dir, load_default, AppConfig, EngineConfig, HttpServerConfig, LlmConfig,
    LoggingConfig, ProviderEndpointConfig, StorefrontConfig,
};
pub use crate::context::{AppContext, KeySource, Services, ServicesFactory};
pub use crate::error::{EngineError, LlmError};
pub use crate::keypool::{
    DynamicKey, KeyPool, KeyRecord, KeySnapshot, PoolSnapshot, Provider, ProviderSnapshot,
};
pub use crate::llm::{extract_json, LlmRouter, ProviderCaller, RETRY_CEILING};
pub use crate::prompts::{
    default_prompts, PromptRegistry, PromptStore, PromptTemplate, GENERAL_CHAT, INTENT_ANALYSIS,
    MISSING_ITEM, PRODUCT_RANKING,
};
pub use crate::recommend::{
    Budget, ChatMessage, IntentAnalysis, ProductMatch, RecommendRequest, RecommendationEngine,
    RecommendationResponse, RequestContext, UnavailableItem,
};
pub use crate::settings::{AiSettings, SettingsCache, SettingsStore};
