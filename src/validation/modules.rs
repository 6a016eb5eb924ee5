//! Target-module checks.
//!
//! The writing product routes AI requests to a fixed set of feature modules,
//! each with its own input expectations. The set is a closed enum dispatched
//! by a single `match`, so adding a module is an exhaustive-checked change.
//! Module names that don't parse are skipped, never rejected.

use crate::core::types::{CheckKind, SecureRequest, SecurityContext, Severity, ValidationCheck};
use crate::validation::patterns::{pii_patterns, scan};
use serde_json::json;

/// Minimum sample size the style analyzer can work with.
const STYLE_SAMPLE_FLOOR: usize = 50;

/// Content size beyond which a plot request reads as a full manuscript
/// rather than an outline.
const PLOT_OUTLINE_CEILING: usize = 2000;

/// The product's AI-facing feature modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetModule {
    CharacterDevelopment,
    PlotGeneration,
    DialogueWriting,
    WorldBuilding,
    StyleAnalysis,
}

impl TargetModule {
    /// Parse a module name as supplied on a request. Unknown names yield
    /// `None` and the module check is skipped.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "character_development" => Some(Self::CharacterDevelopment),
            "plot_generation" => Some(Self::PlotGeneration),
            "dialogue_writing" => Some(Self::DialogueWriting),
            "world_building" => Some(Self::WorldBuilding),
            "style_analysis" => Some(Self::StyleAnalysis),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CharacterDevelopment => "character_development",
            Self::PlotGeneration => "plot_generation",
            Self::DialogueWriting => "dialogue_writing",
            Self::WorldBuilding => "world_building",
            Self::StyleAnalysis => "style_analysis",
        }
    }

    /// Run this module's input check.
    pub(crate) fn check(
        &self,
        request: &SecureRequest,
        _context: &SecurityContext,
    ) -> ValidationCheck {
        match self {
            // Character work needs the profiles it is supposed to develop.
            Self::CharacterDevelopment => {
                let has_profiles = request
                    .auxiliary_data
                    .as_ref()
                    .is_some_and(|profiles| !profiles.is_empty());
                if has_profiles {
                    ValidationCheck::pass(CheckKind::ModuleSpecific, 0.0)
                } else {
                    ValidationCheck::fail(CheckKind::ModuleSpecific, Severity::Medium, 0.5)
                        .with_detail(json!({
                            "module": self.as_str(),
                            "issue": "no character profiles attached",
                        }))
                }
            }

            // Plot requests are outlines; a manuscript-sized body is almost
            // always a misrouted request.
            Self::PlotGeneration => {
                if request.content.len() <= PLOT_OUTLINE_CEILING {
                    ValidationCheck::pass(CheckKind::ModuleSpecific, 0.0)
                } else {
                    ValidationCheck::fail(CheckKind::ModuleSpecific, Severity::Low, 0.3)
                        .with_detail(json!({
                            "module": self.as_str(),
                            "issue": "content too large for an outline request",
                            "length": request.content.len(),
                        }))
                }
            }

            // Dialogue prompts naming realistic people get flagged before
            // they reach generation.
            Self::DialogueWriting => {
                let pii = scan(&request.content, pii_patterns());
                if pii.match_count == 0 {
                    ValidationCheck::pass(CheckKind::ModuleSpecific, 0.0)
                } else {
                    ValidationCheck::fail(CheckKind::ModuleSpecific, Severity::Medium, 0.5)
                        .with_detail(json!({
                            "module": self.as_str(),
                            "issue": "realistic personal names in dialogue prompt",
                            "matches": pii.match_count,
                        }))
                }
            }

            // World-building content with street-address shapes tends to be
            // pasted real-world data.
            Self::WorldBuilding => {
                let pii = scan(&request.content, pii_patterns());
                if pii.match_count == 0 {
                    ValidationCheck::pass(CheckKind::ModuleSpecific, 0.0)
                } else {
                    ValidationCheck::fail(CheckKind::ModuleSpecific, Severity::Low, 0.3)
                        .with_detail(json!({
                            "module": self.as_str(),
                            "issue": "real-world location shapes in world description",
                        }))
                }
            }

            // Style analysis needs enough text to say anything.
            Self::StyleAnalysis => {
                if request.content.trim().len() >= STYLE_SAMPLE_FLOOR {
                    ValidationCheck::pass(CheckKind::ModuleSpecific, 0.0)
                } else {
                    ValidationCheck::fail(CheckKind::ModuleSpecific, Severity::Low, 0.4)
                        .with_detail(json!({
                            "module": self.as_str(),
                            "issue": "sample too short for style analysis",
                            "minimum": STYLE_SAMPLE_FLOOR,
                        }))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{CharacterProfile, UserTier};

    fn context() -> SecurityContext {
        SecurityContext::new(UserTier::Pro, "writer-1", "session-1")
    }

    #[test]
    fn unknown_module_names_do_not_parse() {
        assert_eq!(TargetModule::parse("theme_picker"), None);
        assert_eq!(
            TargetModule::parse("plot_generation"),
            Some(TargetModule::PlotGeneration)
        );
    }

    #[test]
    fn character_development_requires_profiles() {
        let bare = SecureRequest::new("writer-1", "session-1", "Develop my protagonist further.");
        let check = TargetModule::CharacterDevelopment.check(&bare, &context());
        assert!(!check.passed);
        assert_eq!(check.severity, Severity::Medium);

        let with_profiles = bare.with_auxiliary_data(vec![CharacterProfile {
            name: "Elowen".to_string(),
            role: "protagonist".to_string(),
            description: "A tidekeeper's apprentice.".to_string(),
            backstory: String::new(),
        }]);
        assert!(TargetModule::CharacterDevelopment
            .check(&with_profiles, &context())
            .passed);
    }

    #[test]
    fn style_analysis_needs_a_sample() {
        let short = SecureRequest::new("writer-1", "session-1", "Analyze this.");
        assert!(!TargetModule::StyleAnalysis.check(&short, &context()).passed);

        let sample = SecureRequest::new(
            "writer-1",
            "session-1",
            "The fog rolled off the bay in long grey sheets, and the town woke slowly beneath it.",
        );
        assert!(TargetModule::StyleAnalysis.check(&sample, &context()).passed);
    }

    #[test]
    fn dialogue_flags_realistic_names() {
        let request = SecureRequest::new(
            "writer-1",
            "session-1",
            "Write a conversation between Dr. Whitfield and the nurse.",
        );
        let check = TargetModule::DialogueWriting.check(&request, &context());
        assert!(!check.passed);
        assert_eq!(check.severity, Severity::Medium);
    }
}
