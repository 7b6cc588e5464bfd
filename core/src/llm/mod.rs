//! Provider abstraction and orchestration: the caller trait implemented by
//! the concrete HTTP providers, the fast-then-fallback router, and the
//! fence-tolerant JSON extraction used by structured calls.

pub mod json_extract;
mod router;
mod traits;

pub use json_extract::extract_json;
pub use router::LlmRouter;
pub use traits::ProviderCaller;

/// Per-call retry ceiling inside a provider caller. Retries re-resolve the
/// key each attempt, so a different healthy key may serve the retry.
pub const RETRY_CEILING: u32 = 3;
