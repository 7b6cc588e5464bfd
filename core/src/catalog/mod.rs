pub mod models;
mod traits;

pub use models::{Category, Product, ProductQuery, ProductRequestPayload};
pub use traits::{CatalogPlugin, RequestSink};
