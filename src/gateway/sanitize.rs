//! Request sanitization and response filtering.
//!
//! Sanitization targets only the spans already identified by validation:
//! critical-severity violations strip the offending patterns outright,
//! high-severity ones neutralize them with a visible marker, and length
//! overflows truncate to the tier ceiling. Running the sanitizer twice
//! changes nothing: stripped content has no remaining matches.

use crate::core::types::{CheckKind, Severity, UserTier, Violation};
use crate::validation::patterns::{
    executable_content_patterns, injection_patterns, malicious_patterns,
    restricted_markup_patterns,
};
use regex::Regex;

/// Marker left where high-severity content was neutralized.
const NEUTRALIZED: &str = "[filtered]";

/// Whether the sanitizer knows how to repair this violation.
///
/// Pattern-backed violations need high or critical severity (the only levels
/// the sanitizer acts on); length overflows are always repairable by
/// truncation. Everything else (integrity failures, module rejections,
/// profile PII) has no span to cut and must abort the request instead.
pub(crate) fn is_sanitizable(violation: &Violation) -> bool {
    match violation.kind {
        CheckKind::PromptInjection | CheckKind::MaliciousPattern => {
            violation.severity >= Severity::High
        }
        CheckKind::ContentLength => true,
        CheckKind::DataIntegrity
        | CheckKind::ModuleSpecific
        | CheckKind::AuxiliaryDataSecurity => false,
    }
}

/// Apply sanitization for the given violations to `content`.
pub(crate) fn sanitize_content(
    content: &str,
    violations: &[Violation],
    length_ceiling: usize,
) -> String {
    let mut result = content.to_string();

    for violation in violations {
        match violation.kind {
            CheckKind::PromptInjection => {
                result = apply_patterns(&result, injection_patterns(), violation.severity);
            }
            CheckKind::MaliciousPattern => {
                result = apply_patterns(&result, malicious_patterns(), violation.severity);
            }
            CheckKind::ContentLength => {
                result = truncate_at_boundary(result, length_ceiling);
            }
            _ => {}
        }
    }

    result
}

/// Output-side sanitization of backend content.
///
/// Executable-content markers are stripped for every tier; non-Admin tiers
/// also lose the broader HTML/script markup.
pub(crate) fn filter_response(content: &str, tier: UserTier) -> String {
    let mut result = content.to_string();

    for pattern in executable_content_patterns() {
        result = pattern.replace_all(&result, "").into_owned();
    }

    if tier < UserTier::Admin {
        for pattern in restricted_markup_patterns() {
            result = pattern.replace_all(&result, "").into_owned();
        }
    }

    result
}

fn apply_patterns(content: &str, patterns: &[Regex], severity: Severity) -> String {
    let replacement = match severity {
        Severity::Critical => "",
        Severity::High => NEUTRALIZED,
        // Low/medium violations are surfaced, not rewritten.
        _ => return content.to_string(),
    };

    let mut result = content.to_string();
    for pattern in patterns {
        result = pattern.replace_all(&result, replacement).into_owned();
    }
    result
}

fn truncate_at_boundary(mut content: String, max_len: usize) -> String {
    if content.len() <= max_len {
        return content;
    }
    let mut cut = max_len;
    while cut > 0 && !content.is_char_boundary(cut) {
        cut -= 1;
    }
    content.truncate(cut);
    content
}
