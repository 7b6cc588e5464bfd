use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub storefront: StorefrontConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub http_server: HttpServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            llm: LlmConfig::default(),
            storefront: StorefrontConfig::default(),
            engine: EngineConfig::default(),
            http_server: HttpServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "prorab_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    true
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_fast_endpoint")]
    pub fast: ProviderEndpointConfig,

    #[serde(default = "default_fallback_endpoint")]
    pub fallback: ProviderEndpointConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            fast: default_fast_endpoint(),
            fallback: default_fallback_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderEndpointConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_fast_endpoint() -> ProviderEndpointConfig {
    ProviderEndpointConfig {
        base_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
        model: "llama-3.3-70b-versatile".to_string(),
        timeout_ms: default_provider_timeout_ms(),
    }
}

fn default_fallback_endpoint() -> ProviderEndpointConfig {
    ProviderEndpointConfig {
        base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
        model: "gemini-2.0-flash".to_string(),
        timeout_ms: default_provider_timeout_ms(),
    }
}

fn default_provider_timeout_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorefrontConfig {
    #[serde(default = "default_storefront_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_storefront_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_storefront_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_storefront_timeout_ms() -> u64 {
    10_000
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            base_url: default_storefront_url(),
            api_key: "".to_string(),
            timeout_ms: default_storefront_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Candidate pool limit requested from the catalog before filtering.
    /// Result counts come from the AI settings, not from here.
    #[serde(default = "default_catalog_limit")]
    pub catalog_limit: u32,
}

fn default_catalog_limit() -> u32 {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog_limit: default_catalog_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_http_host() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}
