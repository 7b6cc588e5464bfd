use async_trait::async_trait;

use super::models::{Category, Product, ProductQuery, ProductRequestPayload};

/// Read access to the storefront catalog. The recommendation pipeline only
/// consumes this interface; CRUD lives elsewhere.
#[async_trait]
pub trait CatalogPlugin: Send + Sync {
    fn name(&self) -> &str;
    async fn get_categories(&self) -> anyhow::Result<Vec<Category>>;
    async fn get_products(&self, query: ProductQuery) -> anyhow::Result<Vec<Product>>;
}

/// Sink for "wanted but unavailable" product requests.
#[async_trait]
pub trait RequestSink: Send + Sync {
    async fn create_product_request(&self, payload: ProductRequestPayload) -> anyhow::Result<()>;
}
