use prorab_core::api as core_api;
use serde_json::Value;
use std::{error::Error as StdError, fmt};

const BODY_PREVIEW_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorefrontHttpErrorKind {
    Timeout,
    Connect,
    Request,
    Body,
    Decode,
    Status,
    Unknown,
}

impl StorefrontHttpErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Request => "request",
            Self::Body => "body",
            Self::Decode => "decode",
            Self::Status => "status",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StorefrontHttpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct StorefrontHttpError {
    kind: StorefrontHttpErrorKind,
    status: Option<u16>,
    url: Option<String>,
    message: String,
    source: Option<anyhow::Error>,
}

impl StorefrontHttpError {
    pub fn kind(&self) -> StorefrontHttpErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    fn from_reqwest(err: reqwest::Error, url: String) -> Self {
        let kind = if err.is_timeout() {
            StorefrontHttpErrorKind::Timeout
        } else if err.is_connect() {
            StorefrontHttpErrorKind::Connect
        } else if err.is_request() {
            StorefrontHttpErrorKind::Request
        } else if err.is_body() {
            StorefrontHttpErrorKind::Body
        } else if err.is_decode() {
            StorefrontHttpErrorKind::Decode
        } else {
            StorefrontHttpErrorKind::Unknown
        };
        let status = err.status().map(|s| s.as_u16());
        let message = err.to_string();
        StorefrontHttpError {
            kind,
            status,
            url: Some(url),
            message,
            source: Some(anyhow::Error::new(err)),
        }
    }

    fn status_error(status: u16, url: String, preview: String) -> Self {
        StorefrontHttpError {
            kind: StorefrontHttpErrorKind::Status,
            status: Some(status),
            url: Some(url),
            message: preview,
            source: None,
        }
    }

    fn decode_error(status: u16, url: String, err: serde_json::Error, preview: String) -> Self {
        let message = format!("failed to decode response body: {} | body={}", err, preview);
        StorefrontHttpError {
            kind: StorefrontHttpErrorKind::Decode,
            status: Some(status),
            url: Some(url),
            message,
            source: Some(anyhow::Error::new(err)),
        }
    }
}

impl fmt::Display for StorefrontHttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "storefront http error kind={}", self.kind)?;
        if let Some(status) = self.status {
            write!(f, " status={}", status)?;
        }
        if let Some(url) = &self.url {
            write!(f, " url={}", url)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl StdError for StorefrontHttpError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|err| &**err as &(dyn StdError + 'static))
    }
}

fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    let mut out = String::new();
    let mut truncated = false;
    for (idx, ch) in trimmed.chars().enumerate() {
        if idx >= BODY_PREVIEW_LIMIT {
            truncated = true;
            break;
        }
        out.push(ch);
    }

    if truncated {
        out.push_str("...");
    }

    out
}

async fn parse_json_response(resp: reqwest::Response) -> anyhow::Result<Value> {
    let status = resp.status();
    let url = resp.url().to_string();
    let body = resp
        .text()
        .await
        .map_err(|err| StorefrontHttpError::from_reqwest(err, url.clone()))?;

    if !status.is_success() {
        let preview = preview_body(&body);
        return Err(StorefrontHttpError::status_error(status.as_u16(), url, preview).into());
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str::<Value>(&body).map_err(|err| {
        let preview = preview_body(&body);
        StorefrontHttpError::decode_error(status.as_u16(), url, err, preview).into()
    })
}

async fn ensure_success(resp: reqwest::Response) -> anyhow::Result<()> {
    let status = resp.status();
    let url = resp.url().to_string();

    if status.is_success() {
        return Ok(());
    }

    let body = resp
        .text()
        .await
        .map_err(|err| StorefrontHttpError::from_reqwest(err, url.clone()))?;
    let preview = preview_body(&body);
    Err(StorefrontHttpError::status_error(status.as_u16(), url, preview).into())
}

/// Client for the storefront internal API. One instance serves as the
/// catalog reader, the product-request sink, and the source of
/// operator-edited prompts, settings, and API keys.
#[derive(Clone)]
pub struct StorefrontClient {
    api_key: String,
    http: reqwest::Client,
    // Pre-built URL endpoints (avoid repeated format! and trim)
    url_categories: String,
    url_products: String,
    url_product_requests: String,
    url_prompts: String,
    url_settings: String,
    url_api_keys: String,
}

impl StorefrontClient {
    pub fn new(base_url: String, api_key: String, timeout_ms: u64) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()?;
        let normalized = base_url.trim_end_matches('/');
        Ok(Self {
            api_key,
            http,
            url_categories: format!("{}/api/internal/categories", normalized),
            url_products: format!("{}/api/internal/products", normalized),
            url_product_requests: format!("{}/api/internal/product-requests", normalized),
            url_prompts: format!("{}/api/internal/ai-prompts", normalized),
            url_settings: format!("{}/api/internal/ai-settings", normalized),
            url_api_keys: format!("{}/api/internal/ai-keys", normalized),
        })
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.api_key.trim().is_empty() {
            req
        } else {
            req.bearer_auth(&self.api_key)
        }
    }

    async fn get_json(&self, url: &str) -> anyhow::Result<Value> {
        let req = self.http.get(url);
        let resp = self
            .auth(req)
            .send()
            .await
            .map_err(|err| StorefrontHttpError::from_reqwest(err, url.to_string()))?;
        parse_json_response(resp).await
    }

    /// Lists can arrive bare (`[...]`) or wrapped (`{"data": [...]}`,
    /// `{"items": [...]}`) depending on the storefront route.
    fn unwrap_list(value: Value) -> Value {
        if value.is_array() {
            return value;
        }
        for field in ["data", "items", "results"] {
            if let Some(list) = value.get(field) {
                if list.is_array() {
                    return list.clone();
                }
            }
        }
        Value::Array(Vec::new())
    }
}

#[async_trait::async_trait]
impl core_api::CatalogPlugin for StorefrontClient {
    fn name(&self) -> &str {
        "storefront"
    }

    async fn get_categories(&self) -> anyhow::Result<Vec<core_api::Category>> {
        tracing::debug!(
            target: "prorab.http",
            stage = "storefront.categories.in",
            url = %self.url_categories,
        );
        let value = Self::unwrap_list(self.get_json(&self.url_categories).await?);
        let categories: Vec<core_api::Category> = serde_json::from_value(value)?;
        tracing::debug!(
            target: "prorab.http",
            stage = "storefront.categories.out",
            count = categories.len(),
        );
        Ok(categories)
    }

    async fn get_products(
        &self,
        query: core_api::ProductQuery,
    ) -> anyhow::Result<Vec<core_api::Product>> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(cat) = &query.category_id {
            params.push(("categoryId", cat.clone()));
        }
        if let Some(sub) = &query.subcategory_id {
            params.push(("subcategoryId", sub.clone()));
        }
        if query.available_only {
            params.push(("available", "true".to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }

        tracing::debug!(
            target: "prorab.http",
            stage = "storefront.products.in",
            url = %self.url_products,
            params = params.len(),
        );
        let req = self.http.get(&self.url_products).query(&params);
        let resp = self
            .auth(req)
            .send()
            .await
            .map_err(|err| StorefrontHttpError::from_reqwest(err, self.url_products.clone()))?;
        let value = Self::unwrap_list(parse_json_response(resp).await?);
        let products: Vec<core_api::Product> = serde_json::from_value(value)?;
        tracing::debug!(
            target: "prorab.http",
            stage = "storefront.products.out",
            count = products.len(),
        );
        Ok(products)
    }
}

#[async_trait::async_trait]
impl core_api::RequestSink for StorefrontClient {
    async fn create_product_request(
        &self,
        payload: core_api::ProductRequestPayload,
    ) -> anyhow::Result<()> {
        tracing::debug!(
            target: "prorab.http",
            stage = "storefront.product_request.in",
            product = %payload.product_name,
        );
        let req = self.http.post(&self.url_product_requests).json(&payload);
        let resp = self.auth(req).send().await.map_err(|err| {
            StorefrontHttpError::from_reqwest(err, self.url_product_requests.clone())
        })?;
        ensure_success(resp).await
    }
}

#[async_trait::async_trait]
impl core_api::PromptStore for StorefrontClient {
    async fn get_ai_prompts(&self) -> anyhow::Result<Vec<core_api::PromptTemplate>> {
        let value = Self::unwrap_list(self.get_json(&self.url_prompts).await?);
        let prompts: Vec<core_api::PromptTemplate> = serde_json::from_value(value)?;
        tracing::debug!(
            target: "prorab.http",
            stage = "storefront.prompts.out",
            count = prompts.len(),
        );
        Ok(prompts)
    }
}

#[async_trait::async_trait]
impl core_api::SettingsStore for StorefrontClient {
    async fn get_ai_settings(&self) -> anyhow::Result<core_api::AiSettings> {
        let value = self.get_json(&self.url_settings).await?;
        let settings: core_api::AiSettings = serde_json::from_value(value)?;
        Ok(settings)
    }
}

#[async_trait::async_trait]
impl core_api::KeySource for StorefrontClient {
    async fn get_api_keys(&self) -> anyhow::Result<Vec<core_api::DynamicKey>> {
        let value = Self::unwrap_list(self.get_json(&self.url_api_keys).await?);
        let keys: Vec<core_api::DynamicKey> = serde_json::from_value(value)?;
        tracing::debug!(
            target: "prorab.http",
            stage = "storefront.keys.out",
            count = keys.len(),
        );
        Ok(keys)
    }
}
