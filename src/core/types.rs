//! # Core Types Module
//!
//! Foundational data structures shared by every stage of the security
//! pipeline: the immutable request envelope, the caller-supplied security
//! context, tier and severity orderings, and the response types returned to
//! the calling application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Service tier of a caller.
///
/// Tiers are ordered: `Free < Pro < Admin`. The ordering matters for
/// tier-gated behavior such as response filtering and compliance categories,
/// so the derive order of the variants must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    Free,
    Pro,
    Admin,
}

impl fmt::Display for UserTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserTier::Free => write!(f, "free"),
            UserTier::Pro => write!(f, "pro"),
            UserTier::Admin => write!(f, "admin"),
        }
    }
}

/// Ordinal risk label attached to validation violations and audit entries.
///
/// Ordered `Low < Medium < High < Critical`; consolidation picks the maximum
/// severity across violations, so the derive order is load-bearing here too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A character/profile payload attached to writing-assistance requests.
///
/// These come from the product's character-development features and carry
/// free-text fields that must be scanned like any other content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterProfile {
    /// Character name (required identifying field)
    pub name: String,

    /// Narrative role, e.g. "protagonist" (required identifying field)
    pub role: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Free-text background notes
    #[serde(default)]
    pub backstory: String,
}

/// An AI-facing request as submitted by the calling application.
///
/// Immutable once created: sanitization produces a copy via
/// [`SecureRequest::with_content`], never a mutation in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureRequest {
    /// Unique identifier for this request (for tracing and audit correlation)
    pub request_id: String,

    /// Caller identity
    pub user_id: String,

    /// Session identity the caller claims
    pub session_id: String,

    /// Product module this request targets, if any (e.g. "character_development")
    pub target_module: Option<String>,

    /// Raw content to forward to the generation backend
    pub content: String,

    /// Character/profile payloads accompanying the request
    pub auxiliary_data: Option<Vec<CharacterProfile>>,

    /// Arbitrary caller-supplied metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Submission timestamp
    pub timestamp: DateTime<Utc>,
}

impl SecureRequest {
    /// Create a new request with a generated id and current timestamp.
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            target_module: None,
            content: content.into(),
            auxiliary_data: None,
            metadata: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Set the target module.
    pub fn with_target_module(mut self, module: impl Into<String>) -> Self {
        self.target_module = Some(module.into());
        self
    }

    /// Attach character/profile payloads.
    pub fn with_auxiliary_data(mut self, profiles: Vec<CharacterProfile>) -> Self {
        self.auxiliary_data = Some(profiles);
        self
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Produce a sanitized copy carrying replacement content.
    ///
    /// All identity, module, and metadata fields are preserved; only the
    /// content differs.
    pub fn with_content(&self, content: String) -> Self {
        Self {
            content,
            ..self.clone()
        }
    }
}

/// Session identity bound to a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session identifier
    pub id: String,

    /// Caller the session was issued to
    pub user_id: String,

    /// Expiry timestamp; sessions at or past this instant are invalid
    pub expires_at: DateTime<Utc>,
}

impl SessionInfo {
    /// Whether the session is still valid at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Running risk assessment for a caller.
///
/// Risk escalation appends to the gateway's internal ledger; caller-supplied
/// profiles are merged by taking the maximum score, never overwritten
/// destructively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskProfile {
    /// Running risk score in [0, 1]
    pub score: f64,

    /// Timestamp of the most recent violation, if any
    pub last_violation: Option<DateTime<Utc>>,
}

impl RiskProfile {
    /// Merge another profile into this one, keeping the higher score and the
    /// most recent violation timestamp.
    pub fn merged_with(&self, other: &RiskProfile) -> RiskProfile {
        RiskProfile {
            score: self.score.max(other.score),
            last_violation: match (self.last_violation, other.last_violation) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            },
        }
    }

    /// Record a violation, raising the score by `amount` (clamped to 1.0).
    pub fn escalated(&self, amount: f64, at: DateTime<Utc>) -> RiskProfile {
        RiskProfile {
            score: (self.score + amount).min(1.0),
            last_violation: Some(at),
        }
    }
}

/// Caller-supplied security context accompanying every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityContext {
    /// Service tier controlling limits and ceilings
    pub tier: UserTier,

    /// Session the caller presents
    pub session: SessionInfo,

    /// Network origin of the request
    pub source_ip: String,

    /// Client user agent, if known
    pub user_agent: Option<String>,

    /// Device fingerprint, if the client computed one
    pub device_fingerprint: Option<String>,

    /// Risk profile as known to the caller-side session store
    #[serde(default)]
    pub risk_profile: RiskProfile,
}

impl SecurityContext {
    /// Build a context for `tier` with a session valid for one hour.
    pub fn new(tier: UserTier, user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self {
            tier,
            session: SessionInfo {
                id: session_id.into(),
                user_id,
                expires_at: Utc::now() + chrono::Duration::hours(1),
            },
            source_ip: "127.0.0.1".to_string(),
            user_agent: None,
            device_fingerprint: None,
            risk_profile: RiskProfile::default(),
        }
    }

    /// Override the session expiry.
    pub fn with_session_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.session.expires_at = expires_at;
        self
    }

    /// Override the network origin.
    pub fn with_source_ip(mut self, ip: impl Into<String>) -> Self {
        self.source_ip = ip.into();
        self
    }

    /// Override the risk profile.
    pub fn with_risk_profile(mut self, profile: RiskProfile) -> Self {
        self.risk_profile = profile;
        self
    }
}

/// Identifies which validator produced a check outcome or violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    PromptInjection,
    ContentLength,
    MaliciousPattern,
    DataIntegrity,
    ModuleSpecific,
    AuxiliaryDataSecurity,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CheckKind::PromptInjection => "prompt_injection",
            CheckKind::ContentLength => "content_length",
            CheckKind::MaliciousPattern => "malicious_pattern",
            CheckKind::DataIntegrity => "data_integrity",
            CheckKind::ModuleSpecific => "module_specific",
            CheckKind::AuxiliaryDataSecurity => "auxiliary_data_security",
        };
        write!(f, "{}", label)
    }
}

/// Outcome of a single content-security check.
///
/// Produced by exactly one validator and never shared between checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub kind: CheckKind,
    pub severity: Severity,
    pub passed: bool,
    /// Numeric score in [0, 1]; higher is more suspicious
    pub score: f64,
    pub detail: Option<serde_json::Value>,
}

impl ValidationCheck {
    /// A passing check at the given score.
    pub fn pass(kind: CheckKind, score: f64) -> Self {
        Self {
            kind,
            severity: Severity::Low,
            passed: true,
            score,
            detail: None,
        }
    }

    /// A failing check at the given severity and score.
    pub fn fail(kind: CheckKind, severity: Severity, score: f64) -> Self {
        Self {
            kind,
            severity,
            passed: false,
            score,
            detail: None,
        }
    }

    /// Attach a detail payload.
    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// A failed check, as surfaced in validation results and errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub kind: CheckKind,
    pub severity: Severity,
    pub detail: Option<serde_json::Value>,
}

impl From<&ValidationCheck> for Violation {
    fn from(check: &ValidationCheck) -> Self {
        Violation {
            kind: check.kind,
            severity: check.severity,
            detail: check.detail.clone(),
        }
    }
}

/// Consolidated outcome of all checks run against one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Overall pass: true iff there are zero violations
    pub passed: bool,

    /// Mean of all check scores
    pub score: f64,

    /// Every failed check
    pub violations: Vec<Violation>,

    /// Maximum severity among violations; `Low` when there are none
    pub risk_level: Severity,

    /// Fixed remediation advice keyed by violation kind
    pub recommendations: Vec<String>,
}

/// Token accounting reported by the generation backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Compliance categories asserted on a response.
///
/// Baseline categories hold for every tier; elevated categories are only
/// asserted for the Admin tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceStatus {
    pub gdpr: bool,
    pub ccpa: bool,
    pub soc2: bool,
}

impl ComplianceStatus {
    /// Compliance categories for a caller tier.
    pub fn for_tier(tier: UserTier) -> Self {
        Self {
            gdpr: true,
            ccpa: true,
            soc2: tier == UserTier::Admin,
        }
    }
}

/// Security metadata attached to every successful response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityMetadata {
    /// Aggregate validation score for the request
    pub validation_score: f64,

    /// Threat score assessed for the request
    pub threat_score: f64,

    /// Encryption level applied to the stored audit record
    pub encryption_level: String,

    /// Human-readable notes about the pipeline decisions taken
    pub audit_trail: Vec<String>,

    /// Compliance categories asserted for the caller's tier
    pub compliance_status: ComplianceStatus,
}

/// Response returned to the calling application after the full pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecureResponse {
    /// Filtered backend content
    pub content: String,

    /// Backend confidence in the generation, if reported
    pub confidence: f64,

    /// Model identifier the backend used
    pub backend_model: String,

    /// Token accounting for the call
    pub usage: TokenUsage,

    /// Whether the backend served the response from cache
    pub cached: bool,

    /// Severity level the request was processed at
    pub security_level: Severity,

    /// Correlates with the originating [`SecureRequest::request_id`]
    pub request_id: String,

    /// Validation/threat/compliance metadata for the caller
    pub security_metadata: SecurityMetadata,
}
