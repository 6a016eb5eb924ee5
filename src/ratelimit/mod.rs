//! # Rate Limiting System
//!
//! Per-(caller, tier) request admission control with burst and adaptive
//! limits.
//!
//! ## Architecture
//! Each (caller, tier) pair owns one [`RateLimitState`]: a fixed-window
//! counter with a tighter burst ceiling that is enforced on every call, not
//! only at window boundaries, so a spike early in an otherwise-fresh window is
//! still caught. When a window elapses the counter resets and the current
//! adaptive multiplier is re-applied to the base limit.
//!
//! States live in a [`RateLimiterRegistry`] that is constructed by the host
//! and injected into the gateway; there is no process-global registry, so
//! tests get isolated instances for free.

use crate::core::config::{TierConfigs, TierLimits};
use crate::core::types::UserTier;
use dashmap::DashMap;
use metrics::counter;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Behavior classification driving the adaptive limit multiplier.
///
/// The classifier currently reports `Normal` for every caller; the other
/// classes exist so threat handling and future behavioral analysis can tune
/// admission without touching the window algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityClass {
    Normal,
    HighActivity,
    LowActivity,
    Suspicious,
}

impl ActivityClass {
    /// Multiplier applied to the base limit at each window reset.
    pub fn multiplier(&self) -> f64 {
        match self {
            ActivityClass::Normal => 1.0,
            ActivityClass::HighActivity => 1.5,
            ActivityClass::LowActivity => 0.7,
            ActivityClass::Suspicious => 0.3,
        }
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,

    /// Requests left in the current window under the tighter of the
    /// effective limit and the burst ceiling
    pub remaining: u32,

    /// Effective limit for the current window
    pub limit: u32,

    /// How long until the window resets; set on denials
    pub retry_after: Option<Duration>,
}

/// Mutable window state for one (caller, tier) pair.
#[derive(Debug)]
pub struct RateLimitState {
    count: u32,
    window_start: Instant,
    effective_limit: u32,
    limits: TierLimits,
    activity: ActivityClass,
    last_seen: Instant,
}

impl RateLimitState {
    fn new(limits: TierLimits, now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
            effective_limit: limits.requests_per_window,
            limits,
            activity: ActivityClass::Normal,
            last_seen: now,
        }
    }

    /// Run one admission check at `now`.
    ///
    /// The counter is incremented whether or not the request is admitted, so
    /// hammering an exhausted window does not earn extra headroom.
    fn try_acquire_at(&mut self, now: Instant) -> RateLimitDecision {
        self.last_seen = now;

        if now.duration_since(self.window_start) >= self.limits.window {
            self.count = 0;
            self.window_start = now;
            self.effective_limit = ((self.limits.requests_per_window as f64)
                * self.activity.multiplier())
            .max(1.0) as u32;
        }

        self.count += 1;

        let ceiling = self.effective_limit.min(self.limits.burst_limit);
        let allowed = self.count <= self.effective_limit && self.count <= self.limits.burst_limit;

        let retry_after = if allowed {
            None
        } else {
            Some(
                self.limits
                    .window
                    .saturating_sub(now.duration_since(self.window_start)),
            )
        };

        RateLimitDecision {
            allowed,
            remaining: ceiling.saturating_sub(self.count),
            limit: self.effective_limit,
            retry_after,
        }
    }

    fn usage_at(&self, now: Instant) -> UsageSnapshot {
        let elapsed = now.duration_since(self.window_start);
        let window_remaining = self.limits.window.saturating_sub(elapsed);
        UsageSnapshot {
            used: self.count,
            limit: self.effective_limit,
            remaining: self
                .effective_limit
                .min(self.limits.burst_limit)
                .saturating_sub(self.count),
            window_remaining,
        }
    }
}

/// Point-in-time usage for one (caller, tier) pair.
#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub used: u32,
    pub limit: u32,
    pub remaining: u32,
    #[serde(with = "humantime_serde")]
    pub window_remaining: Duration,
}

/// Counters for admitted and denied requests.
#[derive(Debug, Default)]
struct RegistryMetrics {
    allowed: std::sync::atomic::AtomicU64,
    denied: std::sync::atomic::AtomicU64,
}

/// Snapshot of registry metrics.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryMetricsSnapshot {
    pub requests_allowed: u64,
    pub requests_denied: u64,
}

/// Registry of per-(caller, tier) limiter states.
///
/// Admission checks are atomic per key: each state sits behind its own lock,
/// so two concurrent requests from one caller cannot both claim the last slot
/// in a window.
pub struct RateLimiterRegistry {
    limiters: DashMap<(String, UserTier), Arc<Mutex<RateLimitState>>>,
    activity_overrides: DashMap<String, ActivityClass>,
    tiers: TierConfigs,
    metrics: RegistryMetrics,
}

impl RateLimiterRegistry {
    /// Create a registry from per-tier limits.
    pub fn new(tiers: TierConfigs) -> Self {
        Self {
            limiters: DashMap::new(),
            activity_overrides: DashMap::new(),
            tiers,
            metrics: RegistryMetrics::default(),
        }
    }

    /// Check whether one more request from `user_id` is admitted.
    pub fn try_acquire(&self, user_id: &str, tier: UserTier) -> RateLimitDecision {
        self.try_acquire_at(user_id, tier, Instant::now())
    }

    /// Admission check against an explicit clock; the seam tests drive.
    pub fn try_acquire_at(&self, user_id: &str, tier: UserTier, now: Instant) -> RateLimitDecision {
        let state = self.state_for(user_id, tier, now);
        let mut state = state.lock();
        state.activity = self.classify(user_id);
        let decision = state.try_acquire_at(now);

        if decision.allowed {
            self.metrics
                .allowed
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            counter!("gateway_requests_admitted").increment(1);
        } else {
            self.metrics
                .denied
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            counter!("gateway_requests_denied").increment(1);
            debug!(
                user_id = %user_id,
                tier = %tier,
                used = state.count,
                limit = decision.limit,
                "rate limit denial"
            );
        }

        decision
    }

    /// Current usage for a caller without consuming a slot.
    pub fn current_usage(&self, user_id: &str, tier: UserTier) -> UsageSnapshot {
        let now = Instant::now();
        let state = self.state_for(user_id, tier, now);
        let state = state.lock();
        state.usage_at(now)
    }

    /// Standard rate-limit response headers for a caller.
    pub fn headers(&self, user_id: &str, tier: UserTier) -> HashMap<String, String> {
        let usage = self.current_usage(user_id, tier);
        let reset_epoch = SystemTime::now()
            .checked_add(usage.window_remaining)
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut headers = HashMap::new();
        headers.insert("X-RateLimit-Limit".to_string(), usage.limit.to_string());
        headers.insert(
            "X-RateLimit-Remaining".to_string(),
            usage.remaining.to_string(),
        );
        headers.insert("X-RateLimit-Reset".to_string(), reset_epoch.to_string());
        headers.insert("X-RateLimit-User-Tier".to_string(), tier.to_string());
        headers
    }

    /// Configured limits for a tier.
    pub fn tier_info(&self, tier: UserTier) -> &TierLimits {
        self.tiers.for_tier(tier)
    }

    /// Override the behavior classification for a caller.
    ///
    /// Takes effect at the caller's next window reset. Threat handling uses
    /// this to throttle high-threat callers when policy asks for it.
    pub fn set_activity(&self, user_id: &str, class: ActivityClass) {
        self.activity_overrides.insert(user_id.to_string(), class);
    }

    /// Behavior classification for a caller. Reports any override set by
    /// threat handling, otherwise `Normal`.
    pub fn classify(&self, user_id: &str) -> ActivityClass {
        self.activity_overrides
            .get(user_id)
            .map(|entry| *entry.value())
            .unwrap_or(ActivityClass::Normal)
    }

    /// Drop limiter states idle for longer than `max_idle`.
    pub fn prune_idle(&self, max_idle: Duration) {
        let now = Instant::now();
        self.limiters.retain(|_, state| {
            let state = state.lock();
            now.duration_since(state.last_seen) < max_idle
        });
    }

    /// Snapshot of admission counters.
    pub fn metrics_snapshot(&self) -> RegistryMetricsSnapshot {
        RegistryMetricsSnapshot {
            requests_allowed: self.metrics.allowed.load(std::sync::atomic::Ordering::Relaxed),
            requests_denied: self.metrics.denied.load(std::sync::atomic::Ordering::Relaxed),
        }
    }

    fn state_for(
        &self,
        user_id: &str,
        tier: UserTier,
        now: Instant,
    ) -> Arc<Mutex<RateLimitState>> {
        self.limiters
            .entry((user_id.to_string(), tier))
            .or_insert_with(|| {
                Arc::new(Mutex::new(RateLimitState::new(
                    self.tiers.for_tier(tier).clone(),
                    now,
                )))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TierConfigs;

    fn registry() -> RateLimiterRegistry {
        RateLimiterRegistry::new(TierConfigs::default())
    }

    #[test]
    fn burst_ceiling_is_checked_every_call() {
        let registry = registry();
        let now = Instant::now();

        // Free tier: limit 100, burst 10. The 11th request in a fresh window
        // must be denied even though the nominal limit is far away.
        for i in 0..10 {
            let decision = registry.try_acquire_at("writer-1", UserTier::Free, now);
            assert!(decision.allowed, "request {} should be admitted", i + 1);
        }
        let decision = registry.try_acquire_at("writer-1", UserTier::Free, now);
        assert!(!decision.allowed);
        assert!(decision.retry_after.is_some());
    }

    #[test]
    fn window_elapse_resets_counter() {
        let registry = registry();
        let now = Instant::now();

        for _ in 0..11 {
            registry.try_acquire_at("writer-2", UserTier::Free, now);
        }
        assert!(!registry.try_acquire_at("writer-2", UserTier::Free, now).allowed);

        let later = now + Duration::from_secs(3601);
        let decision = registry.try_acquire_at("writer-2", UserTier::Free, later);
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 9);
    }

    #[test]
    fn callers_do_not_share_windows() {
        let registry = registry();
        let now = Instant::now();

        for _ in 0..10 {
            registry.try_acquire_at("writer-a", UserTier::Free, now);
        }
        assert!(!registry.try_acquire_at("writer-a", UserTier::Free, now).allowed);
        assert!(registry.try_acquire_at("writer-b", UserTier::Free, now).allowed);
    }

    #[test]
    fn suspicious_multiplier_applies_at_window_reset() {
        let registry = registry();
        let now = Instant::now();

        registry.try_acquire_at("writer-3", UserTier::Pro, now);
        registry.set_activity("writer-3", ActivityClass::Suspicious);

        // Pro base limit 500; suspicious multiplier 0.3 -> 150 at next reset.
        let later = now + Duration::from_secs(3601);
        let decision = registry.try_acquire_at("writer-3", UserTier::Pro, later);
        assert_eq!(decision.limit, 150);
    }

    #[test]
    fn retry_after_reflects_window_remainder() {
        let registry = registry();
        let now = Instant::now();

        for _ in 0..10 {
            registry.try_acquire_at("writer-4", UserTier::Free, now);
        }
        let denied = registry.try_acquire_at(
            "writer-4",
            UserTier::Free,
            now + Duration::from_secs(600),
        );
        assert!(!denied.allowed);
        let retry_after = denied.retry_after.unwrap();
        assert_eq!(retry_after, Duration::from_secs(3000));
    }

    #[test]
    fn headers_expose_standard_fields() {
        let registry = registry();
        registry.try_acquire("writer-5", UserTier::Pro);

        let headers = registry.headers("writer-5", UserTier::Pro);
        assert_eq!(headers.get("X-RateLimit-Limit").unwrap(), "500");
        assert_eq!(headers.get("X-RateLimit-User-Tier").unwrap(), "pro");
        assert!(headers.contains_key("X-RateLimit-Remaining"));
        assert!(headers.get("X-RateLimit-Reset").unwrap().parse::<u64>().is_ok());
    }

    #[test]
    fn concurrent_acquires_never_over_admit() {
        let registry = Arc::new(registry());
        let now = Instant::now();
        let mut handles = Vec::new();

        for _ in 0..4 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                let mut admitted = 0u32;
                for _ in 0..10 {
                    if registry.try_acquire_at("writer-6", UserTier::Free, now).allowed {
                        admitted += 1;
                    }
                }
                admitted
            }));
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        // Burst ceiling for Free is 10; 40 racing requests may admit at most that.
        assert_eq!(total, 10);
    }

    #[test]
    fn prune_drops_idle_states() {
        let registry = registry();
        registry.try_acquire("writer-7", UserTier::Free);
        assert_eq!(registry.limiters.len(), 1);

        registry.prune_idle(Duration::from_secs(0));
        assert_eq!(registry.limiters.len(), 0);
    }
}
