pub mod common;
pub mod fallback;
pub mod fast;

pub use fallback::FallbackProvider;
pub use fast::FastProvider;
