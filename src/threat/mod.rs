//! # Threat Assessment
//!
//! Standalone numeric threat scoring, used both inside validation decisions
//! and as the gateway's escalation signal. The scorer is a pure function of
//! (request, context) behind a trait so a trained classifier can replace the
//! heuristic without changing the gateway's contract.

use crate::core::types::{SecureRequest, SecurityContext};

/// Content length above which a request earns a size penalty.
const LARGE_CONTENT_THRESHOLD: usize = 5000;

/// Administrative and privilege-adjacent keywords.
const PRIVILEGED_KEYWORDS: &[&str] = &[
    "admin",
    "administrator",
    "root",
    "sudo",
    "superuser",
    "privilege",
    "escalate",
];

/// Assigns a request a threat score in [0, 1].
pub trait ThreatScorer: Send + Sync {
    /// Score a request; higher means more likely malicious, independent of
    /// whether the request failed explicit pattern checks.
    fn score(&self, request: &SecureRequest, context: &SecurityContext) -> f64;
}

/// Reference heuristic scorer.
///
/// Additive signals, clamped to [0, 1]:
/// - +0.1 for unusually large content
/// - +0.2 for administrative/privileged keywords in the content
/// - +0.3 for a caller whose running risk score exceeds 0.5
#[derive(Debug, Default)]
pub struct HeuristicThreatScorer;

impl HeuristicThreatScorer {
    pub fn new() -> Self {
        Self
    }
}

impl ThreatScorer for HeuristicThreatScorer {
    fn score(&self, request: &SecureRequest, context: &SecurityContext) -> f64 {
        let mut score: f64 = 0.0;

        if request.content.len() > LARGE_CONTENT_THRESHOLD {
            score += 0.1;
        }

        let lowered = request.content.to_lowercase();
        if PRIVILEGED_KEYWORDS
            .iter()
            .any(|keyword| lowered.contains(keyword))
        {
            score += 0.2;
        }

        if context.risk_profile.score > 0.5 {
            score += 0.3;
        }

        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{RiskProfile, UserTier};

    fn context() -> SecurityContext {
        SecurityContext::new(UserTier::Free, "writer-1", "session-1")
    }

    #[test]
    fn benign_request_scores_zero() {
        let scorer = HeuristicThreatScorer::new();
        let request = SecureRequest::new("writer-1", "session-1", "Describe a quiet harbor town.");
        assert_eq!(scorer.score(&request, &context()), 0.0);
    }

    #[test]
    fn privileged_keywords_add_weight() {
        let scorer = HeuristicThreatScorer::new();
        let request = SecureRequest::new(
            "writer-1",
            "session-1",
            "Write as the admin of the server room.",
        );
        assert_eq!(scorer.score(&request, &context()), 0.2);
    }

    #[test]
    fn signals_accumulate_and_clamp() {
        let scorer = HeuristicThreatScorer::new();
        let long_privileged = format!("sudo {}", "x".repeat(6000));
        let request = SecureRequest::new("writer-1", "session-1", long_privileged);
        let context = context().with_risk_profile(RiskProfile {
            score: 0.9,
            last_violation: None,
        });

        // 0.1 (size) + 0.2 (keywords) + 0.3 (risky caller)
        let score = scorer.score(&request, &context);
        assert!((score - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn risky_caller_alone_scores_point_three() {
        let scorer = HeuristicThreatScorer::new();
        let request = SecureRequest::new("writer-1", "session-1", "A short poem about rain.");
        let context = context().with_risk_profile(RiskProfile {
            score: 0.6,
            last_violation: None,
        });
        assert!((scorer.score(&request, &context) - 0.3).abs() < f64::EPSILON);
    }
}
