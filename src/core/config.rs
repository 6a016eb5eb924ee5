//! # Configuration Module
//!
//! Configuration for the security gateway and its subsystems.
//!
//! ## Key Features
//! - YAML/JSON parsing with serde and human-readable durations
//! - Sensible defaults matching the product's published tier limits
//! - Validation with detailed error messages before anything is constructed

use crate::core::error::{SecurityError, SecurityResult};
use crate::core::types::UserTier;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete configuration for the security gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Per-tier admission and content limits
    pub tiers: TierConfigs,

    /// Threat-assessment thresholds and blocking policy
    pub threat: ThreatPolicy,

    /// Audit buffering and flush behavior
    pub audit: AuditSettings,

    /// Alert channel switches
    pub alerts: AlertConfig,

    /// Ceiling on a single backend call; slower calls surface as
    /// forwarding failures instead of holding the pipeline open
    #[serde(with = "humantime_serde")]
    pub forward_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            tiers: TierConfigs::default(),
            threat: ThreatPolicy::default(),
            audit: AuditSettings::default(),
            alerts: AlertConfig::default(),
            forward_timeout: Duration::from_secs(30),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file.
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> SecurityResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SecurityError::config(format!("failed to read config file: {}", e)))?;

        let config: GatewayConfig = serde_yaml::from_str(&content)
            .map_err(|e| SecurityError::config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub async fn load_from_json<P: AsRef<Path>>(path: P) -> SecurityResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SecurityError::config(format!("failed to read config file: {}", e)))?;

        let config: GatewayConfig = serde_json::from_str(&content)
            .map_err(|e| SecurityError::config(format!("failed to parse JSON config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, returning the first problem found.
    pub fn validate(&self) -> SecurityResult<()> {
        for tier in [UserTier::Free, UserTier::Pro, UserTier::Admin] {
            let limits = self.tiers.for_tier(tier);
            if limits.requests_per_window == 0 {
                return Err(SecurityError::config(format!(
                    "tier {}: requests_per_window must be positive",
                    tier
                )));
            }
            if limits.window.is_zero() {
                return Err(SecurityError::config(format!(
                    "tier {}: window must be positive",
                    tier
                )));
            }
            if limits.burst_limit == 0 {
                return Err(SecurityError::config(format!(
                    "tier {}: burst_limit must be positive",
                    tier
                )));
            }
            if limits.max_content_length == 0 {
                return Err(SecurityError::config(format!(
                    "tier {}: max_content_length must be positive",
                    tier
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.threat.high_threshold)
            || !(0.0..=1.0).contains(&self.threat.critical_threshold)
        {
            return Err(SecurityError::config(
                "threat thresholds must lie in [0, 1]",
            ));
        }
        if self.threat.high_threshold >= self.threat.critical_threshold {
            return Err(SecurityError::config(
                "threat high_threshold must be below critical_threshold",
            ));
        }

        if self.audit.buffer_capacity == 0 {
            return Err(SecurityError::config("audit buffer_capacity must be positive"));
        }
        if self.audit.flush_interval.is_zero() {
            return Err(SecurityError::config("audit flush_interval must be positive"));
        }

        if self.forward_timeout.is_zero() {
            return Err(SecurityError::config("forward_timeout must be positive"));
        }

        Ok(())
    }
}

/// Admission and content limits for one tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierLimits {
    /// Nominal request limit per window
    pub requests_per_window: u32,

    /// Window length
    #[serde(with = "humantime_serde")]
    pub window: Duration,

    /// Tighter always-enforced ceiling catching spikes inside a fresh window
    pub burst_limit: u32,

    /// Content-length ceiling in characters
    pub max_content_length: usize,
}

/// Limits for all three tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfigs {
    pub free: TierLimits,
    pub pro: TierLimits,
    pub admin: TierLimits,
}

impl Default for TierConfigs {
    fn default() -> Self {
        Self {
            free: TierLimits {
                requests_per_window: 100,
                window: Duration::from_secs(3600),
                burst_limit: 10,
                max_content_length: 1000,
            },
            pro: TierLimits {
                requests_per_window: 500,
                window: Duration::from_secs(3600),
                burst_limit: 50,
                max_content_length: 5000,
            },
            admin: TierLimits {
                requests_per_window: 2000,
                window: Duration::from_secs(3600),
                burst_limit: 200,
                max_content_length: 10000,
            },
        }
    }
}

impl TierConfigs {
    /// Limits for a tier.
    pub fn for_tier(&self, tier: UserTier) -> &TierLimits {
        match tier {
            UserTier::Free => &self.free,
            UserTier::Pro => &self.pro,
            UserTier::Admin => &self.admin,
        }
    }
}

/// Threat-assessment policy.
///
/// High-threat requests are audited (and optionally throttled) but continue
/// through the pipeline; critical-threat requests block the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatPolicy {
    /// Scores above this are audited as high-threat events
    pub high_threshold: f64,

    /// Scores above this block the caller for `block_duration`
    pub critical_threshold: f64,

    /// How long a critically-flagged caller stays blocked
    #[serde(with = "humantime_serde")]
    pub block_duration: Duration,

    /// Whether high-threat (non-critical) requests are also denied admission
    /// on their next rate-limit window rather than merely logged
    pub throttle_on_high: bool,
}

impl Default for ThreatPolicy {
    fn default() -> Self {
        Self {
            high_threshold: 0.8,
            critical_threshold: 0.9,
            block_duration: Duration::from_secs(24 * 3600),
            throttle_on_high: false,
        }
    }
}

/// Audit buffering and flush behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Entries held in memory before a flush is triggered
    pub buffer_capacity: usize,

    /// Periodic flush interval
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: 100,
            flush_interval: Duration::from_secs(30),
        }
    }
}

/// Alert channel switches; each channel is enabled independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub email: bool,
    pub chat_webhook: bool,
    pub webhook: bool,
    pub sms: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            email: true,
            chat_webhook: false,
            webhook: false,
            sms: false,
        }
    }
}
