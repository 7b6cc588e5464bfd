mod load;
mod types;

pub use load::{get_prorab_data_dir, load_default};
pub use types::{
    AppConfig, EngineConfig, HttpServerConfig, LlmConfig, LoggingConfig, ProviderEndpointConfig,
    StorefrontConfig,
};
