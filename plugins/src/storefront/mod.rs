pub mod client;

pub use client::{StorefrontClient, StorefrontHttpError, StorefrontHttpErrorKind};
