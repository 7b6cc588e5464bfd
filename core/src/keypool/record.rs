use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Upstream inference providers. `Fast` is tried first by the router;
/// `Fallback` is the second (and last) resort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Fast,
    Fallback,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Fast => "fast",
            Provider::Fallback => "fallback",
        }
    }

    pub fn all() -> [Provider; 2] {
        [Provider::Fast, Provider::Fallback]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Provider::Fast),
            "fallback" => Ok(Provider::Fallback),
            other => Err(format!("unknown provider '{other}'")),
        }
    }
}

/// Failures in a row before a key is put into a short cooldown.
pub const COOLDOWN_AFTER_CONSECUTIVE: u32 = 3;
/// Cooldown applied after consecutive failures.
pub const FAILURE_COOLDOWN_SECS: i64 = 30;
/// Cooldown applied on an HTTP 429, regardless of error bookkeeping.
pub const RATE_LIMIT_COOLDOWN_SECS: i64 = 60;
/// Near-permanent cooldown for invalid/leaked keys (removal without
/// deleting history).
pub const INVALID_COOLDOWN_SECS: i64 = 365 * 24 * 3600;
/// Soft-disable thresholds: both must hold for the key to be skipped.
pub const SOFT_DISABLE_ERRORS: u64 = 10;
pub const SOFT_DISABLE_CONSECUTIVE: u32 = 5;

/// One managed credential, mutated in place on every call outcome.
#[derive(Debug, Clone, Serialize)]
pub struct KeyRecord {
    #[serde(skip_serializing)]
    pub secret: String,
    pub id: String,
    pub provider: Provider,
    pub index: usize,
    pub calls: u64,
    pub errors: u64,
    pub consecutive_errors: u32,
    pub rate_limited: bool,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub last_used: Option<DateTime<Utc>>,
}

impl KeyRecord {
    pub fn new(secret: String, provider: Provider, index: usize) -> Self {
        Self {
            secret,
            id: format!("{}-{}", provider, index + 1),
            provider,
            index,
            calls: 0,
            errors: 0,
            consecutive_errors: 0,
            rate_limited: false,
            cooldown_until: None,
            last_used: None,
        }
    }

    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.map(|t| t > now).unwrap_or(false)
    }

    /// Cooldown that has already elapsed but was never cleared. These keys
    /// are the recovery candidates of the second selection pass.
    pub fn cooldown_expired(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.map(|t| t <= now).unwrap_or(false)
    }

    pub fn soft_disabled(&self) -> bool {
        self.errors > SOFT_DISABLE_ERRORS && self.consecutive_errors > SOFT_DISABLE_CONSECUTIVE
    }

    pub fn is_healthy(&self, now: DateTime<Utc>) -> bool {
        !self.in_cooldown(now) && !self.rate_limited && !self.soft_disabled()
    }

    /// Success clears the consecutive-error streak but keeps the cumulative
    /// error counter for auditing and soft-disable decisions.
    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.calls += 1;
        self.consecutive_errors = 0;
        self.last_used = Some(now);
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        self.calls += 1;
        self.errors += 1;
        self.consecutive_errors += 1;
        self.last_used = Some(now);
        if self.consecutive_errors >= COOLDOWN_AFTER_CONSECUTIVE {
            self.cooldown_until = Some(now + Duration::seconds(FAILURE_COOLDOWN_SECS));
        }
    }

    /// Rate limits are provider-enforced and independent of our error
    /// bookkeeping, so the cooldown applies immediately.
    pub fn record_rate_limit(&mut self, now: DateTime<Utc>) {
        self.calls += 1;
        self.rate_limited = true;
        self.last_used = Some(now);
        self.cooldown_until = Some(now + Duration::seconds(RATE_LIMIT_COOLDOWN_SECS));
    }

    pub fn record_invalid(&mut self, now: DateTime<Utc>) {
        self.errors += 1;
        self.cooldown_until = Some(now + Duration::seconds(INVALID_COOLDOWN_SECS));
    }

    /// Self-healing reset used when an expired cooldown is picked up again.
    pub fn clear_cooldown(&mut self) {
        self.rate_limited = false;
        self.cooldown_until = None;
        self.consecutive_errors = 0;
    }

    pub fn cooldown_remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        self.cooldown_until
            .map(|t| (t - now).num_seconds().max(0))
            .unwrap_or(0)
    }

    pub fn masked_secret(&self) -> String {
        mask_secret(&self.secret)
    }
}

/// Masked form for health snapshots and logs. Never log raw secrets.
/// Counts characters, not bytes, so non-ASCII secrets cannot split a
/// codepoint.
pub fn mask_secret(secret: &str) -> String {
    let s = secret.trim();
    let len = s.chars().count();
    if len < 12 {
        return "***".to_string();
    }
    let head: String = s.chars().take(4).collect();
    let tail: String = s.chars().skip(len - 4).collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn fresh_key_is_healthy() {
        let k = KeyRecord::new("sk-test-0000000000".into(), Provider::Fast, 0);
        assert!(k.is_healthy(now()));
        assert_eq!(k.id, "fast-1");
    }

    #[test]
    fn three_consecutive_failures_trigger_cooldown() {
        let t = now();
        let mut k = KeyRecord::new("sk-test-0000000000".into(), Provider::Fast, 0);
        k.record_failure(t);
        k.record_failure(t);
        assert!(k.is_healthy(t));
        k.record_failure(t);
        assert!(!k.is_healthy(t));
        assert_eq!(k.cooldown_remaining_secs(t), FAILURE_COOLDOWN_SECS);
    }

    #[test]
    fn success_resets_streak_but_not_total() {
        let t = now();
        let mut k = KeyRecord::new("sk-test-0000000000".into(), Provider::Fast, 0);
        k.record_failure(t);
        k.record_failure(t);
        k.record_success(t);
        assert_eq!(k.consecutive_errors, 0);
        assert_eq!(k.errors, 2);
    }

    #[test]
    fn rate_limit_cooldown_is_sixty_seconds() {
        let t = now();
        let mut k = KeyRecord::new("sk-test-0000000000".into(), Provider::Fallback, 0);
        k.record_rate_limit(t);
        assert!(k.rate_limited);
        assert_eq!(k.cooldown_remaining_secs(t), RATE_LIMIT_COOLDOWN_SECS);
    }

    #[test]
    fn expired_cooldown_is_not_active() {
        let t = now();
        let mut k = KeyRecord::new("sk-test-0000000000".into(), Provider::Fast, 0);
        k.cooldown_until = Some(t - chrono::Duration::seconds(1));
        assert!(!k.in_cooldown(t));
        assert!(k.cooldown_expired(t));
    }

    #[test]
    fn mask_short_and_long_secrets() {
        assert_eq!(mask_secret("short"), "***");
        assert_eq!(mask_secret("sk-abcdef12345678"), "sk-a...5678");
    }

    #[test]
    fn mask_handles_multibyte_secrets() {
        assert_eq!(mask_secret("ключ-абвгд-1234567890"), "ключ...7890");
        assert_eq!(mask_secret("密钥abc"), "***");
    }
}
