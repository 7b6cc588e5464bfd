pub mod factory;
pub mod provider;
pub mod storefront;
