use thiserror::Error;

use crate::keypool::Provider;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("llm call failed: {0}")]
    Llm(#[from] LlmError),
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("request sink error: {0}")]
    RequestSink(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Provider/pool/parse taxonomy shared by the key pool, the provider callers
/// and the orchestration facade.
#[derive(Error, Debug)]
pub enum LlmError {
    /// No usable credential for the provider right now: none configured, or
    /// every key is cooling down / soft-disabled.
    #[error("key pool exhausted for provider '{provider}'")]
    KeyPoolExhausted { provider: Provider },
    #[error("provider request failed with status {status}: {body}")]
    RequestFailed { status: u16, body: String },
    #[error("provider rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("provider returned no extractable text")]
    EmptyResponse,
    #[error("failed to parse provider response: {0}")]
    ParseFailed(String),
    #[error("prompt template not found: {0}")]
    PromptNotFound(String),
    #[error("prompt template disabled: {0}")]
    PromptDisabled(String),
    #[error("transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

impl LlmError {
    /// Configuration-level errors indicate operator mistakes and must surface
    /// distinctly instead of triggering the provider fallback chain.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LlmError::PromptNotFound(_) | LlmError::PromptDisabled(_)
        )
    }
}
