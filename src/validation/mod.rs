//! # Input Validation System
//!
//! Runs the independent content-security checks against a request and
//! consolidates them into one verdict.
//!
//! ## Architecture
//! Checks never see each other's results and are order-insensitive: each
//! produces exactly one [`ValidationCheck`]. Consolidation collects failed
//! checks as violations, averages the scores, and labels the result with the
//! maximum severity observed. The target-module check is dispatched over the
//! closed [`modules::TargetModule`] enum; module names that don't parse are
//! skipped rather than rejected.

pub mod modules;
pub(crate) mod patterns;

use crate::core::config::TierConfigs;
use crate::core::types::{
    CharacterProfile, CheckKind, SecureRequest, SecurityContext, Severity, UserTier,
    ValidationCheck, ValidationResult, Violation,
};
use metrics::counter;
use modules::TargetModule;
use patterns::{
    injection_patterns, malicious_patterns, pii_patterns, scan, score_content,
    suspicious_metadata_patterns,
};
use serde_json::json;
use tracing::debug;

/// Suspicion score below which a prompt-injection check passes.
const INJECTION_PASS_CEILING: f64 = 0.5;

/// Malicious-pattern score at or above which the check fails.
const MALICIOUS_FAIL_FLOOR: f64 = 0.3;

/// Free-text score at or above which auxiliary profile text fails integrity.
const PROFILE_TEXT_FAIL_FLOOR: f64 = 0.5;

/// Runs all content-security checks for one request.
pub struct InputValidator {
    tiers: TierConfigs,
}

impl InputValidator {
    pub fn new(tiers: TierConfigs) -> Self {
        Self { tiers }
    }

    /// Validate a request in the given security context.
    pub fn validate(&self, request: &SecureRequest, context: &SecurityContext) -> ValidationResult {
        let mut checks = vec![
            self.prompt_injection_check(request),
            self.content_length_check(request, context.tier),
            self.malicious_pattern_check(request),
            self.data_integrity_check(request),
        ];

        if let Some(module) = request
            .target_module
            .as_deref()
            .and_then(TargetModule::parse)
        {
            checks.push(module.check(request, context));
        }

        if let Some(profiles) = request.auxiliary_data.as_deref() {
            if !profiles.is_empty() {
                checks.push(self.auxiliary_pii_check(profiles));
            }
        }

        let result = consolidate(checks);
        if !result.passed {
            counter!("gateway_validation_failures").increment(1);
            debug!(
                request_id = %request.request_id,
                violations = result.violations.len(),
                risk_level = %result.risk_level,
                "validation failed"
            );
        }
        result
    }

    fn prompt_injection_check(&self, request: &SecureRequest) -> ValidationCheck {
        let scan = scan(&request.content, injection_patterns());
        let score = patterns::suspicion_score(&scan, request.content.len());

        let severity = if score > 0.8 {
            Severity::Critical
        } else if score > INJECTION_PASS_CEILING {
            Severity::High
        } else {
            Severity::Low
        };

        let check = if score < INJECTION_PASS_CEILING {
            ValidationCheck::pass(CheckKind::PromptInjection, score)
        } else {
            ValidationCheck::fail(CheckKind::PromptInjection, severity, score)
        };

        if scan.match_count > 0 {
            check.with_detail(json!({
                "matches": scan.match_count,
                "patterns": scan.matched_patterns,
            }))
        } else {
            check
        }
    }

    fn content_length_check(&self, request: &SecureRequest, tier: UserTier) -> ValidationCheck {
        let ceiling = self.tiers.for_tier(tier).max_content_length;
        let length = request.content.len();
        // Deliberately uncapped: a score above 1.0 says how far past the
        // ceiling the request landed.
        let score = length as f64 / ceiling as f64;

        if length <= ceiling {
            return ValidationCheck::pass(CheckKind::ContentLength, score);
        }

        let severity = if score >= 2.0 {
            Severity::High
        } else if score >= 1.2 {
            Severity::Medium
        } else {
            Severity::Low
        };

        ValidationCheck::fail(CheckKind::ContentLength, severity, score).with_detail(json!({
            "length": length,
            "ceiling": ceiling,
        }))
    }

    fn malicious_pattern_check(&self, request: &SecureRequest) -> ValidationCheck {
        let scan = scan(&request.content, malicious_patterns());
        let score = patterns::suspicion_score(&scan, request.content.len());

        if score < MALICIOUS_FAIL_FLOOR {
            return ValidationCheck::pass(CheckKind::MaliciousPattern, score);
        }

        let severity = if score > 0.8 {
            Severity::Critical
        } else if score > 0.5 {
            Severity::High
        } else {
            Severity::Medium
        };

        ValidationCheck::fail(CheckKind::MaliciousPattern, severity, score).with_detail(json!({
            "matches": scan.match_count,
            "patterns": scan.matched_patterns,
        }))
    }

    fn data_integrity_check(&self, request: &SecureRequest) -> ValidationCheck {
        let mut issues: Vec<String> = Vec::new();
        let mut severity = Severity::Low;
        let mut score: f64 = 0.0;

        if request.content.trim().is_empty() {
            issues.push("content is empty or whitespace-only".to_string());
            severity = severity.max(Severity::High);
            score = score.max(1.0);
        }

        for (key, value) in &request.metadata {
            let rendered = match value.as_str() {
                Some(s) => s.to_string(),
                None => value.to_string(),
            };
            let key_hits = scan(key, suspicious_metadata_patterns()).match_count;
            let value_hits = scan(&rendered, suspicious_metadata_patterns()).match_count;
            if key_hits + value_hits > 0 {
                issues.push(format!("suspicious metadata entry '{}'", key));
                severity = severity.max(Severity::Medium);
                score = score.max(0.6);
            }
        }

        if let Some(profiles) = request.auxiliary_data.as_deref() {
            for (index, profile) in profiles.iter().enumerate() {
                if profile.name.trim().is_empty() || profile.role.trim().is_empty() {
                    issues.push(format!("profile {} is missing name or role", index));
                    severity = severity.max(Severity::Medium);
                    score = score.max(0.5);
                }

                for text in [&profile.description, &profile.backstory] {
                    let text_score = score_content(text, injection_patterns())
                        .max(score_content(text, malicious_patterns()));
                    if text_score >= PROFILE_TEXT_FAIL_FLOOR {
                        issues.push(format!("profile {} free text looks hostile", index));
                        severity = severity.max(Severity::High);
                        score = score.max(text_score);
                    }
                }
            }
        }

        if issues.is_empty() {
            ValidationCheck::pass(CheckKind::DataIntegrity, 0.0)
        } else {
            ValidationCheck::fail(CheckKind::DataIntegrity, severity, score)
                .with_detail(json!({ "issues": issues }))
        }
    }

    fn auxiliary_pii_check(&self, profiles: &[CharacterProfile]) -> ValidationCheck {
        let mut combined = String::new();
        for profile in profiles {
            combined.push_str(&profile.name);
            combined.push('\n');
            combined.push_str(&profile.description);
            combined.push('\n');
            combined.push_str(&profile.backstory);
            combined.push('\n');
        }

        let scan = scan(&combined, pii_patterns());
        let score = patterns::suspicion_score(&scan, combined.len());

        if scan.match_count == 0 {
            ValidationCheck::pass(CheckKind::AuxiliaryDataSecurity, score)
        } else {
            ValidationCheck::fail(CheckKind::AuxiliaryDataSecurity, Severity::Medium, score)
                .with_detail(json!({ "matches": scan.match_count }))
        }
    }
}

/// Consolidate independent check outcomes into one verdict.
fn consolidate(checks: Vec<ValidationCheck>) -> ValidationResult {
    let score = if checks.is_empty() {
        0.0
    } else {
        checks.iter().map(|c| c.score).sum::<f64>() / checks.len() as f64
    };

    let violations: Vec<Violation> = checks
        .iter()
        .filter(|check| !check.passed)
        .map(Violation::from)
        .collect();

    let risk_level = violations
        .iter()
        .map(|v| v.severity)
        .max()
        .unwrap_or(Severity::Low);

    let mut recommendations: Vec<String> = Vec::new();
    for violation in &violations {
        let advice = recommendation(violation.kind);
        if !recommendations.iter().any(|r| r == advice) {
            recommendations.push(advice.to_string());
        }
    }

    ValidationResult {
        passed: violations.is_empty(),
        score,
        violations,
        risk_level,
        recommendations,
    }
}

/// Fixed remediation advice per check kind.
fn recommendation(kind: CheckKind) -> &'static str {
    match kind {
        CheckKind::PromptInjection => {
            "Remove instruction-override or script-like phrasing and resubmit"
        }
        CheckKind::ContentLength => "Shorten the content to fit your tier's length ceiling",
        CheckKind::MaliciousPattern => {
            "Remove code, path, or credential-like fragments from the content"
        }
        CheckKind::DataIntegrity => "Provide non-empty content and plain metadata values",
        CheckKind::ModuleSpecific => "Review the target module's input requirements",
        CheckKind::AuxiliaryDataSecurity => {
            "Remove realistic personal details from character profiles"
        }
    }
}
