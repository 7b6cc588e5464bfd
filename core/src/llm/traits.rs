use async_trait::async_trait;

use crate::error::LlmError;
use crate::keypool::Provider;

/// One upstream text-completion endpoint. Implementations own request
/// framing, per-call retries and text extraction for their provider's
/// response schema; key checkout and outcome reporting go through the
/// shared pool.
#[async_trait]
pub trait ProviderCaller: Send + Sync {
    fn provider(&self) -> Provider;

    /// Send a fully rendered prompt and return the extracted response text.
    async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String, LlmError>;
}
