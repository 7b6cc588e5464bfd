//! Multi-provider credential pool: per-key health tracking, cooldown-based
//! circuit breaking and sticky healthy-key selection.

mod pool;
mod record;

pub use pool::{DynamicKey, KeyPool, KeySnapshot, PoolSnapshot, ProviderSnapshot, DYNAMIC_REFRESH_SECS};
pub use record::{
    mask_secret, KeyRecord, Provider, COOLDOWN_AFTER_CONSECUTIVE, FAILURE_COOLDOWN_SECS,
    INVALID_COOLDOWN_SECS, RATE_LIMIT_COOLDOWN_SECS, SOFT_DISABLE_CONSECUTIVE, SOFT_DISABLE_ERRORS,
};
