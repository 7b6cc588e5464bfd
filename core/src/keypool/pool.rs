use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{mask_secret, KeyRecord, Provider};
use crate::error::LlmError;

/// How long loaded dynamic keys are considered fresh.
pub const DYNAMIC_REFRESH_SECS: i64 = 60;

/// Maximum number of static env slots scanned per provider
/// (`PRORAB_FAST_API_KEY`, `PRORAB_FAST_API_KEY_2` .. `_9`).
const MAX_ENV_SLOTS: usize = 9;

/// One key from the operator-managed store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicKey {
    pub provider: Provider,
    pub secret: String,
}

/// Process-wide credential pool. Shared behind an `Arc`, internally
/// synchronized; callers never hold records across await points.
pub struct KeyPool {
    state: Mutex<PoolState>,
}

#[derive(Default)]
struct PoolState {
    keys: Vec<KeyRecord>,
    static_keys: Vec<(Provider, String)>,
    initialized: bool,
    dynamic_set: Option<Vec<DynamicKey>>,
    last_dynamic_load: Option<DateTime<Utc>>,
    /// Last index handed out per provider, for observability only.
    active_index: HashMap<Provider, usize>,
}

impl Default for KeyPool {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyPool {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PoolState::default()),
        }
    }

    /// Parse static env configuration once per process. Safe to call again;
    /// subsequent calls are no-ops. Returns the number of keys ingested.
    pub fn initialize_from_env(&self) -> usize {
        let mut slots = Vec::new();
        for provider in Provider::all() {
            for name in env_slot_names(provider) {
                if let Ok(v) = std::env::var(&name) {
                    if !v.trim().is_empty() {
                        slots.push((provider, v.trim().to_string()));
                    }
                }
            }
        }
        self.initialize_with(slots)
    }

    /// Idempotent static ingestion from explicit slots (tests and embedders).
    pub fn initialize_with(&self, slots: Vec<(Provider, String)>) -> usize {
        let mut state = self.state.lock().unwrap();
        if state.initialized {
            return state.keys.len();
        }
        state.initialized = true;
        state.static_keys = slots;
        let static_keys = state.static_keys.clone();
        for (provider, secret) in static_keys {
            state.push_unique(provider, secret);
        }
        tracing::info!(
            target: "prorab.keys",
            stage = "pool.init",
            keys = state.keys.len(),
            "key pool initialized from static configuration"
        );
        state.keys.len()
    }

    /// True when dynamic keys were never loaded or are older than the
    /// refresh interval. Callers use this to decide whether to re-fetch from
    /// the operator store before `load_dynamic_keys`.
    pub fn needs_refresh(&self) -> bool {
        self.state.lock().unwrap().needs_refresh(Utc::now())
    }

    /// Merge an externally supplied key list into the pool. Returns whether
    /// a rebuild actually happened (an unchanged dynamic set is a cheap
    /// no-op so in-flight health state is not discarded for nothing).
    pub fn load_dynamic_keys(&self, records: Vec<DynamicKey>) -> bool {
        self.state.lock().unwrap().merge_dynamic(records, Utc::now())
    }

    /// One healthy secret for the provider, or `KeyPoolExhausted`.
    pub fn get_active_key(&self, provider: Provider) -> Result<String, LlmError> {
        self.state.lock().unwrap().select(provider, Utc::now())
    }

    pub fn has_keys(&self, provider: Provider) -> bool {
        self.state
            .lock()
            .unwrap()
            .keys
            .iter()
            .any(|k| k.provider == provider)
    }

    pub fn mark_success(&self, secret: &str) {
        self.state.lock().unwrap().mark(secret, Utc::now(), |k, now| {
            k.record_success(now);
        });
    }

    pub fn mark_failed(&self, secret: &str) {
        self.state.lock().unwrap().mark(secret, Utc::now(), |k, now| {
            k.record_failure(now);
            tracing::warn!(
                target: "prorab.keys",
                stage = "pool.mark_failed",
                key = %k.id,
                consecutive = k.consecutive_errors,
                cooldown_secs = k.cooldown_remaining_secs(now),
            );
        });
    }

    pub fn mark_rate_limited(&self, secret: &str) {
        self.state.lock().unwrap().mark(secret, Utc::now(), |k, now| {
            k.record_rate_limit(now);
            tracing::warn!(
                target: "prorab.keys",
                stage = "pool.mark_rate_limited",
                key = %k.id,
                cooldown_secs = k.cooldown_remaining_secs(now),
            );
        });
    }

    pub fn mark_invalid(&self, secret: &str) {
        self.state.lock().unwrap().mark(secret, Utc::now(), |k, now| {
            k.record_invalid(now);
            tracing::error!(
                target: "prorab.keys",
                stage = "pool.mark_invalid",
                key = %k.id,
                "key soft-disabled as invalid/leaked"
            );
        });
    }

    /// Read-only diagnostic view. Never used for routing decisions.
    pub fn snapshot(&self) -> PoolSnapshot {
        self.state.lock().unwrap().snapshot(Utc::now())
    }
}

impl PoolState {
    fn push_unique(&mut self, provider: Provider, secret: String) {
        if self.keys.iter().any(|k| k.secret == secret) {
            return;
        }
        let index = self.next_index(provider);
        self.keys.push(KeyRecord::new(secret, provider, index));
    }

    fn next_index(&self, provider: Provider) -> usize {
        self.keys
            .iter()
            .filter(|k| k.provider == provider)
            .map(|k| k.index + 1)
            .max()
            .unwrap_or(0)
    }

    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.last_dynamic_load {
            None => true,
            Some(t) => (now - t).num_seconds() > DYNAMIC_REFRESH_SECS,
        }
    }

    fn merge_dynamic(&mut self, records: Vec<DynamicKey>, now: DateTime<Utc>) -> bool {
        if self.dynamic_set.as_ref() == Some(&records) {
            self.last_dynamic_load = Some(now);
            return false;
        }

        let old: Vec<KeyRecord> = std::mem::take(&mut self.keys);
        // Dynamic-source keys take precedence on secret collisions; static
        // slots fill in behind them.
        let mut wanted: Vec<(Provider, String)> = Vec::new();
        for rec in &records {
            if !wanted.iter().any(|(_, s)| s == &rec.secret) {
                wanted.push((rec.provider, rec.secret.clone()));
            }
        }
        for (provider, secret) in &self.static_keys {
            if !wanted.iter().any(|(_, s)| s == secret) {
                wanted.push((*provider, secret.clone()));
            }
        }

        for (provider, secret) in wanted {
            match old.iter().find(|k| k.secret == secret) {
                // Re-ordering must not drop accumulated health statistics.
                Some(prev) => {
                    let mut kept = prev.clone();
                    kept.provider = provider;
                    self.keys.push(kept);
                }
                None => {
                    let index = self.next_index(provider);
                    self.keys.push(KeyRecord::new(secret, provider, index));
                }
            }
        }

        self.dynamic_set = Some(records);
        self.last_dynamic_load = Some(now);
        tracing::info!(
            target: "prorab.keys",
            stage = "pool.dynamic_merge",
            keys = self.keys.len(),
            "key pool rebuilt from dynamic source"
        );
        true
    }

    fn select(&mut self, provider: Provider, now: DateTime<Utc>) -> Result<String, LlmError> {
        // First pass: sticky scan in stored order, first healthy key wins.
        if let Some(pos) = self
            .keys
            .iter()
            .position(|k| k.provider == provider && k.is_healthy(now))
        {
            let key = &self.keys[pos];
            self.active_index.insert(provider, key.index);
            return Ok(key.secret.clone());
        }

        // Second pass: recover any key whose cooldown has expired.
        if let Some(key) = self
            .keys
            .iter_mut()
            .find(|k| k.provider == provider && k.cooldown_expired(now) && !k.soft_disabled())
        {
            key.clear_cooldown();
            tracing::info!(
                target: "prorab.keys",
                stage = "pool.recover",
                key = %key.id,
                "cooldown expired, key returned to rotation"
            );
            let secret = key.secret.clone();
            let index = key.index;
            self.active_index.insert(provider, index);
            return Ok(secret);
        }

        Err(LlmError::KeyPoolExhausted { provider })
    }

    fn mark<F>(&mut self, secret: &str, now: DateTime<Utc>, f: F)
    where
        F: FnOnce(&mut KeyRecord, DateTime<Utc>),
    {
        // Unknown secrets are a no-op, not an error: the pool may have been
        // rebuilt between key checkout and outcome reporting.
        if let Some(key) = self.keys.iter_mut().find(|k| k.secret == secret) {
            f(key, now);
        }
    }

    fn snapshot(&self, now: DateTime<Utc>) -> PoolSnapshot {
        let mut providers = Vec::new();
        for provider in Provider::all() {
            let keys: Vec<KeySnapshot> = self
                .keys
                .iter()
                .filter(|k| k.provider == provider)
                .map(|k| KeySnapshot {
                    id: k.id.clone(),
                    secret: mask_secret(&k.secret),
                    healthy: k.is_healthy(now),
                    rate_limited: k.rate_limited,
                    calls: k.calls,
                    errors: k.errors,
                    consecutive_errors: k.consecutive_errors,
                    cooldown_remaining_secs: k.cooldown_remaining_secs(now),
                    last_used: k.last_used,
                })
                .collect();
            providers.push(ProviderSnapshot {
                provider,
                total: keys.len(),
                healthy: keys.iter().filter(|k| k.healthy).count(),
                active_index: self.active_index.get(&provider).copied(),
                keys,
            });
        }
        PoolSnapshot {
            total: self.keys.len(),
            last_dynamic_load: self.last_dynamic_load,
            providers,
        }
    }
}

fn env_slot_names(provider: Provider) -> Vec<String> {
    let base = format!("PRORAB_{}_API_KEY", provider.as_str().to_ascii_uppercase());
    let mut names = vec![base.clone()];
    for n in 2..=MAX_ENV_SLOTS {
        names.push(format!("{base}_{n}"));
    }
    names
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub total: usize,
    pub last_dynamic_load: Option<DateTime<Utc>>,
    pub providers: Vec<ProviderSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderSnapshot {
    pub provider: Provider,
    pub total: usize,
    pub healthy: usize,
    pub active_index: Option<usize>,
    pub keys: Vec<KeySnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeySnapshot {
    pub id: String,
    pub secret: String,
    pub healthy: bool,
    pub rate_limited: bool,
    pub calls: u64,
    pub errors: u64,
    pub consecutive_errors: u32,
    pub cooldown_remaining_secs: i64,
    pub last_used: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypool::record::RATE_LIMIT_COOLDOWN_SECS;
    use chrono::Duration;

    fn pool_with(slots: &[(Provider, &str)]) -> PoolState {
        let mut state = PoolState::default();
        state.initialized = true;
        state.static_keys = slots
            .iter()
            .map(|(p, s)| (*p, s.to_string()))
            .collect();
        let seeded = state.static_keys.clone();
        for (p, s) in seeded {
            state.push_unique(p, s);
        }
        state
    }

    fn three_key_pool() -> PoolState {
        pool_with(&[
            (Provider::Fast, "sk-fast-000000000001"),
            (Provider::Fast, "sk-fast-000000000002"),
            (Provider::Fast, "sk-fast-000000000003"),
        ])
    }

    #[test]
    fn sticky_selection_prefers_first_key() {
        let mut state = three_key_pool();
        let now = Utc::now();
        for _ in 0..3 {
            assert_eq!(
                state.select(Provider::Fast, now).unwrap(),
                "sk-fast-000000000001"
            );
        }
    }

    #[test]
    fn rotation_after_three_consecutive_failures() {
        let mut state = three_key_pool();
        let now = Utc::now();
        for _ in 0..3 {
            let key = state.select(Provider::Fast, now).unwrap();
            assert_eq!(key, "sk-fast-000000000001");
            state.mark(&key, now, |k, t| k.record_failure(t));
        }
        // key[0] is cooling down; selection moves to key[1] and stays off
        // key[0] until the cooldown passes.
        let next = state.select(Provider::Fast, now).unwrap();
        assert_eq!(next, "sk-fast-000000000002");
        let later = now + Duration::seconds(10);
        assert_eq!(
            state.select(Provider::Fast, later).unwrap(),
            "sk-fast-000000000002"
        );
    }

    #[test]
    fn rate_limited_key_recovers_after_cooldown() {
        let mut state = pool_with(&[(Provider::Fast, "sk-fast-000000000001")]);
        let t0 = Utc::now();
        state.mark("sk-fast-000000000001", t0, |k, t| k.record_rate_limit(t));

        let t59 = t0 + Duration::seconds(RATE_LIMIT_COOLDOWN_SECS - 1);
        assert!(matches!(
            state.select(Provider::Fast, t59),
            Err(LlmError::KeyPoolExhausted { .. })
        ));
        let snap = state.snapshot(t59);
        let key = &snap.providers[0].keys[0];
        assert!(!key.healthy);
        assert!(key.cooldown_remaining_secs > 0);

        let t61 = t0 + Duration::seconds(RATE_LIMIT_COOLDOWN_SECS + 1);
        assert_eq!(
            state.select(Provider::Fast, t61).unwrap(),
            "sk-fast-000000000001"
        );
        assert!(!state.keys[0].rate_limited);
        assert!(state.keys[0].cooldown_until.is_none());
    }

    #[test]
    fn exhausted_pool_then_natural_expiry() {
        let mut state = pool_with(&[
            (Provider::Fast, "sk-fast-000000000001"),
            (Provider::Fast, "sk-fast-000000000002"),
        ]);
        let t0 = Utc::now();
        state.mark("sk-fast-000000000001", t0, |k, t| k.record_rate_limit(t));
        // Second key cools down 30s after three failures.
        for _ in 0..3 {
            state.mark("sk-fast-000000000002", t0, |k, t| k.record_failure(t));
        }
        assert!(matches!(
            state.select(Provider::Fast, t0 + Duration::seconds(5)),
            Err(LlmError::KeyPoolExhausted { .. })
        ));

        // key[1]'s shorter cooldown expires first and it becomes eligible
        // again on the first pass (an elapsed cooldown counts as none).
        let t35 = t0 + Duration::seconds(35);
        assert_eq!(
            state.select(Provider::Fast, t35).unwrap(),
            "sk-fast-000000000002"
        );

        // key[0] stays flagged until its own cooldown passes, then the
        // recovery pass clears the rate-limited state.
        let t61 = t0 + Duration::seconds(61);
        for _ in 0..3 {
            state.mark("sk-fast-000000000002", t35, |k, t| k.record_failure(t));
        }
        assert_eq!(
            state.select(Provider::Fast, t61).unwrap(),
            "sk-fast-000000000001"
        );
        assert!(!state.keys[0].rate_limited);
    }

    #[test]
    fn unknown_provider_pool_is_exhausted() {
        let mut state = pool_with(&[(Provider::Fast, "sk-fast-000000000001")]);
        let err = state.select(Provider::Fallback, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            LlmError::KeyPoolExhausted {
                provider: Provider::Fallback
            }
        ));
    }

    #[test]
    fn dynamic_merge_preserves_stats_by_secret() {
        let mut state = three_key_pool();
        let t0 = Utc::now();
        for _ in 0..2 {
            state.mark("sk-fast-000000000002", t0, |k, t| k.record_failure(t));
        }

        let rebuilt = state.merge_dynamic(
            vec![
                DynamicKey {
                    provider: Provider::Fast,
                    secret: "sk-dyn-0000000000001".into(),
                },
                DynamicKey {
                    provider: Provider::Fast,
                    secret: "sk-fast-000000000002".into(),
                },
            ],
            t0,
        );
        assert!(rebuilt);

        // Dynamic keys lead the stored order; the surviving secret kept its
        // counters despite being re-ordered.
        assert_eq!(state.keys[0].secret, "sk-dyn-0000000000001");
        let kept = state
            .keys
            .iter()
            .find(|k| k.secret == "sk-fast-000000000002")
            .unwrap();
        assert_eq!(kept.errors, 2);
        assert_eq!(kept.consecutive_errors, 2);
    }

    #[test]
    fn identical_dynamic_set_skips_rebuild() {
        let mut state = pool_with(&[(Provider::Fast, "sk-fast-000000000001")]);
        let t0 = Utc::now();
        let records = vec![DynamicKey {
            provider: Provider::Fallback,
            secret: "sk-dyn-0000000000001".into(),
        }];
        assert!(state.merge_dynamic(records.clone(), t0));
        state.mark("sk-dyn-0000000000001", t0, |k, t| k.record_failure(t));
        assert!(!state.merge_dynamic(records, t0 + Duration::seconds(10)));
        // Health state survived the no-op reload.
        assert_eq!(
            state
                .keys
                .iter()
                .find(|k| k.secret == "sk-dyn-0000000000001")
                .unwrap()
                .errors,
            1
        );
    }

    #[test]
    fn refresh_interval() {
        let mut state = PoolState::default();
        let t0 = Utc::now();
        assert!(state.needs_refresh(t0));
        state.merge_dynamic(vec![], t0);
        assert!(!state.needs_refresh(t0 + Duration::seconds(DYNAMIC_REFRESH_SECS - 1)));
        assert!(state.needs_refresh(t0 + Duration::seconds(DYNAMIC_REFRESH_SECS + 1)));
    }

    #[test]
    fn initialize_is_idempotent() {
        let pool = KeyPool::new();
        assert_eq!(
            pool.initialize_with(vec![(Provider::Fast, "sk-fast-000000000001".into())]),
            1
        );
        assert_eq!(
            pool.initialize_with(vec![(Provider::Fast, "sk-other-00000000001".into())]),
            1
        );
        assert!(pool.has_keys(Provider::Fast));
        assert!(!pool.has_keys(Provider::Fallback));
    }

    #[test]
    fn snapshot_masks_secrets() {
        let pool = KeyPool::new();
        pool.initialize_with(vec![(Provider::Fast, "sk-fast-000000000001".into())]);
        let snap = pool.snapshot();
        assert_eq!(snap.total, 1);
        let key = &snap.providers[0].keys[0];
        assert!(!key.secret.contains("000000"));
        assert!(key.secret.contains("..."));
    }

    #[test]
    fn marking_unknown_secret_is_noop() {
        let pool = KeyPool::new();
        pool.initialize_with(vec![(Provider::Fast, "sk-fast-000000000001".into())]);
        pool.mark_failed("sk-not-in-pool");
        let snap = pool.snapshot();
        assert_eq!(snap.providers[0].keys[0].errors, 0);
    }
}
