//! Fallback inference provider, the Gemini generateContent API. The key
//! travels as a query parameter, so the logged URL never includes it.

use prorab_core::api as core_api;
use serde_json::json;
use std::sync::Arc;

pub struct FallbackProvider {
    pool: Arc<core_api::KeyPool>,
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl FallbackProvider {
    pub fn new(
        pool: Arc<core_api::KeyPool>,
        cfg: &core_api::ProviderEndpointConfig,
        temperature: f32,
        max_tokens: u32,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            pool,
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            temperature,
            max_tokens,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, model)
    }
}

#[async_trait::async_trait]
impl core_api::ProviderCaller for FallbackProvider {
    fn provider(&self) -> core_api::Provider {
        core_api::Provider::Fallback
    }

    async fn complete(
        &self,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<String, core_api::LlmError> {
        let model = model.unwrap_or(&self.model);
        let url = self.endpoint(model);
        let payload = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            },
        });

        tracing::debug!(
            target: "prorab.llm",
            stage = "fallback.call",
            model = %model,
            prompt_len = prompt.len(),
        );

        super::common::call_with_rotation(
            &self.pool,
            core_api::Provider::Fallback,
            &url,
            |key| self.http.post(&url).query(&[("key", key)]).json(&payload),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_api::ProviderCaller;
    use mockito::Matcher;
    use mockito::Server;

    #[tokio::test]
    async fn key_rides_as_query_parameter() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/gemini-2.0-flash:generateContent")
            .match_query(Matcher::UrlEncoded(
                "key".into(),
                "gm-key-000000000001".into(),
            ))
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"from gemini"}]}}]}"#)
            .create_async()
            .await;

        let pool = Arc::new(core_api::KeyPool::new());
        pool.initialize_with(vec![(
            core_api::Provider::Fallback,
            "gm-key-000000000001".into(),
        )]);

        let cfg = core_api::ProviderEndpointConfig {
            base_url: server.url(),
            model: "gemini-2.0-flash".into(),
            timeout_ms: 5_000,
        };
        let provider = FallbackProvider::new(pool, &cfg, 0.7, 256).unwrap();

        let out = provider.complete("hello", None).await.unwrap();
        assert_eq!(out, "from gemini");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_error_surfaces_status_and_preview() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/gemini-2.0-flash:generateContent")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("internal error")
            .expect_at_least(1)
            .create_async()
            .await;

        let pool = Arc::new(core_api::KeyPool::new());
        pool.initialize_with(vec![(
            core_api::Provider::Fallback,
            "gm-key-000000000001".into(),
        )]);

        let cfg = core_api::ProviderEndpointConfig {
            base_url: server.url(),
            model: "gemini-2.0-flash".into(),
            timeout_ms: 5_000,
        };
        let provider = FallbackProvider::new(pool, &cfg, 0.7, 256).unwrap();

        let err = provider.complete("hello", None).await.unwrap_err();
        match err {
            core_api::LlmError::RequestFailed { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("internal error"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
