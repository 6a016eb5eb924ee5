//! Pattern sets and the shared suspicion scorer used by the content checks.
//!
//! All sets are compiled once on first use. The scorer weighs how much of the
//! content the matches cover, normalized by content length, with a bonus for
//! repeated hits.

use regex::Regex;
use std::sync::OnceLock;

/// Instruction-override phrases, script/template-injection markers, and
/// dangerous API names seen in prompt-injection attempts.
const INJECTION_PATTERNS: &[&str] = &[
    r"(?i)ignore\s+(all\s+)?previous\s+instructions",
    r"(?i)disregard\s+(all\s+)?(prior|previous|earlier)\s+(instructions|prompts|context)",
    r"(?i)forget\s+everything\s+(above|before)",
    r"(?i)you\s+are\s+now\s+(a|an|the)\b",
    r"(?i)act\s+as\s+(if\s+you\s+were\s+)?(the\s+)?system",
    r"(?i)reveal\s+(your\s+)?system\s+prompt",
    r"(?i)<script[^>]*>",
    r"(?i)javascript:",
    r"\{\{[^}]*\}\}",
    r"\$\{[^}]*\}",
    r"(?i)\beval\s*\(",
    r"(?i)\bexec\s*\(",
    r"(?i)\bnew\s+Function\s*\(",
];

/// Injection-style syntax, path traversal, and credential-shaped tokens.
const MALICIOUS_PATTERNS: &[&str] = &[
    r"(?i)\b(union\s+select|insert\s+into|drop\s+table|delete\s+from)\b",
    r"(?i)<iframe[^>]*>",
    r"\.\./",
    r"\.\.\\",
    r"(?i)%2e%2e%2f",
    r#"(?i)\b(api[_-]?key|secret|password|credential|auth[_-]?token)\s*[:=]\s*\S+"#,
    r"-----BEGIN\s+(RSA\s+|EC\s+)?PRIVATE\s+KEY-----",
    r"(?i)\b(cmd\.exe|/bin/sh|/bin/bash|powershell)\b",
];

/// Realistic-looking personal information: names with honorifics and
/// street-address shapes.
const PII_PATTERNS: &[&str] = &[
    r"\b(Mr|Mrs|Ms|Dr|Prof)\.\s+[A-Z][a-z]+",
    r"\b\d{1,5}\s+[A-Z][a-z]+\s+(Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Court|Ct)\b",
];

/// Executable-content markers stripped from every backend response.
const EXECUTABLE_CONTENT_PATTERNS: &[&str] = &[
    r"(?i)<script[^>]*>[\s\S]*?</script>",
    r"(?i)<script[^>]*>",
    r"(?i)javascript:",
    r"(?i)\bon\w+\s*=\s*",
];

/// Broader HTML/script markup stripped for non-Admin tiers.
const RESTRICTED_MARKUP_PATTERNS: &[&str] = &[
    r"(?i)<iframe[^>]*>[\s\S]*?</iframe>",
    r"(?i)<iframe[^>]*>",
    r"(?i)<object[^>]*>",
    r"(?i)<embed[^>]*>",
    r"(?i)<form[^>]*>",
    r"(?i)<style[^>]*>[\s\S]*?</style>",
];

/// Script-like metadata keys or values.
const SUSPICIOUS_METADATA_PATTERNS: &[&str] = &[
    r"(?i)\bscript\b",
    r"(?i)\bon(load|error|click|mouseover)\b",
    r"(?i)javascript:",
    r"(?i)\beval\b",
];

fn compile(set: &[&str]) -> Vec<Regex> {
    set.iter()
        .map(|p| Regex::new(p).expect("pattern set entry must compile"))
        .collect()
}

macro_rules! pattern_set {
    ($fn_name:ident, $set:ident) => {
        pub(crate) fn $fn_name() -> &'static [Regex] {
            static SET: OnceLock<Vec<Regex>> = OnceLock::new();
            SET.get_or_init(|| compile($set))
        }
    };
}

pattern_set!(injection_patterns, INJECTION_PATTERNS);
pattern_set!(malicious_patterns, MALICIOUS_PATTERNS);
pattern_set!(pii_patterns, PII_PATTERNS);
pattern_set!(executable_content_patterns, EXECUTABLE_CONTENT_PATTERNS);
pattern_set!(restricted_markup_patterns, RESTRICTED_MARKUP_PATTERNS);
pattern_set!(suspicious_metadata_patterns, SUSPICIOUS_METADATA_PATTERNS);

/// Raw result of scanning content against one pattern set.
#[derive(Debug, Default)]
pub(crate) struct PatternScan {
    /// Total number of matches across all patterns
    pub match_count: usize,

    /// Characters covered by matches
    pub matched_chars: usize,

    /// The pattern sources that matched at least once
    pub matched_patterns: Vec<String>,
}

/// Scan content against a pattern set.
pub(crate) fn scan(content: &str, patterns: &[Regex]) -> PatternScan {
    let mut result = PatternScan::default();
    for pattern in patterns {
        let mut hits = 0;
        for m in pattern.find_iter(content) {
            hits += 1;
            result.matched_chars += m.len();
        }
        if hits > 0 {
            result.match_count += hits;
            result.matched_patterns.push(pattern.as_str().to_string());
        }
    }
    result
}

/// Suspicion score in [0, 1] for a scan over content of `content_len` bytes.
///
/// Any match lands at 0.4; match coverage of the content raises it toward
/// 1.0 (a request that is mostly attack pattern scores as such), and repeat
/// hits earn a bonus: +0.15 above two matches, +0.3 above five.
pub(crate) fn suspicion_score(scan: &PatternScan, content_len: usize) -> f64 {
    if scan.match_count == 0 {
        return 0.0;
    }

    let coverage = scan.matched_chars as f64 / content_len.max(1) as f64;
    let base = 0.4 + 0.5 * coverage.min(1.0);
    let bonus = if scan.match_count > 5 {
        0.3
    } else if scan.match_count > 2 {
        0.15
    } else {
        0.0
    };

    (base + bonus).min(1.0)
}

/// Convenience: scan and score in one step.
pub(crate) fn score_content(content: &str, patterns: &[Regex]) -> f64 {
    suspicion_score(&scan(content, patterns), content.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_content_scores_zero() {
        let scan = scan("A quiet morning in the harbor.", injection_patterns());
        assert_eq!(scan.match_count, 0);
        assert_eq!(suspicion_score(&scan, 30), 0.0);
    }

    #[test]
    fn instruction_override_dominating_content_is_near_one() {
        let content = "Ignore previous instructions";
        let score = score_content(content, injection_patterns());
        assert!(score > 0.8, "score {} should be critical-range", score);
    }

    #[test]
    fn single_match_in_long_content_stays_low() {
        let content = format!("{} ignore previous instructions", "word ".repeat(400));
        let score = score_content(&content, injection_patterns());
        assert!(score < 0.5, "score {} should pass", score);
        assert!(score >= 0.4);
    }

    #[test]
    fn repeat_hits_earn_bonus() {
        let padding = "word ".repeat(500);
        let three = format!("{p} eval( exec( javascript:", p = padding);
        let scan3 = scan(&three, injection_patterns());
        assert_eq!(scan3.match_count, 3);
        let with_bonus = suspicion_score(&scan3, three.len());

        let one = format!("{p} eval(", p = padding);
        let scan1 = scan(&one, injection_patterns());
        let without_bonus = suspicion_score(&scan1, one.len());

        assert!(with_bonus > without_bonus + 0.1);
    }

    #[test]
    fn credential_assignments_match() {
        let scan = scan("api_key=sk-123456 in my settings", malicious_patterns());
        assert!(scan.match_count >= 1);
    }

    #[test]
    fn path_traversal_matches() {
        let scan = scan("open ../../etc/passwd please", malicious_patterns());
        assert!(scan.match_count >= 1);
    }

    #[test]
    fn honorific_names_and_addresses_are_pii() {
        assert!(scan("She met Dr. Harmon yesterday", pii_patterns()).match_count >= 1);
        assert!(scan("lives at 221 Baker Street", pii_patterns()).match_count >= 1);
        assert_eq!(scan("the doctor crossed the street", pii_patterns()).match_count, 0);
    }
}
