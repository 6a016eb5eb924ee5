//! Compliance reporting over audit history.
//!
//! Reports are derived, read-only aggregates: one linear scan over the
//! queried window produces every count and distribution, and the compliance
//! score is a 0–100 health metric reduced by violations, high-threat events,
//! and failures.

use crate::audit::AuditLogEntry;
use crate::core::types::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Threat score above which an event counts as high-threat.
pub const HIGH_THREAT_FLOOR: f64 = 0.7;

/// Penalty weights for the compliance score.
const VIOLATION_PENALTY: i64 = 5;
const HIGH_THREAT_PENALTY: i64 = 3;
const FAILURE_PENALTY: i64 = 2;

/// Reporting window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Headline numbers for the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_events: usize,
    pub security_violations: usize,
    pub high_threat_events: usize,
    /// Events per caller
    pub user_activity: HashMap<String, usize>,
    /// 0–100; see the penalty weights above
    pub compliance_score: u32,
}

/// Bucketed threat-score distribution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreatDistribution {
    /// score <= 0.3
    pub low: usize,
    /// 0.3 < score <= 0.7
    pub medium: usize,
    /// score > 0.7
    pub high: usize,
}

/// Detailed breakdowns for the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDetails {
    pub threat_distribution: ThreatDistribution,
    /// Events per security level
    pub security_levels: HashMap<Severity, usize>,
    /// Events per action name
    pub actions: HashMap<String, usize>,
    pub failed_actions: usize,
}

/// Derived compliance report for a time range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub period: ReportPeriod,
    pub summary: ReportSummary,
    pub details: ReportDetails,
    pub recommendations: Vec<String>,
}

/// Build a report from the entries of one queried window.
///
/// Each entry contributes at most one penalty, in priority order: security
/// violation, then high threat, then plain failure. A violation that also
/// failed is not punished twice.
pub fn generate(
    entries: &[AuditLogEntry],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> ComplianceReport {
    let mut security_violations = 0usize;
    let mut high_threat_events = 0usize;
    let mut failed_actions = 0usize;
    let mut user_activity: HashMap<String, usize> = HashMap::new();
    let mut actions: HashMap<String, usize> = HashMap::new();
    let mut security_levels: HashMap<Severity, usize> = HashMap::new();
    let mut threat_distribution = ThreatDistribution::default();
    let mut penalty: i64 = 0;

    for entry in entries {
        *user_activity.entry(entry.user_id.clone()).or_insert(0) += 1;
        *actions.entry(entry.action.clone()).or_insert(0) += 1;
        *security_levels.entry(entry.security_level).or_insert(0) += 1;

        if entry.threat_score > HIGH_THREAT_FLOOR {
            threat_distribution.high += 1;
        } else if entry.threat_score > 0.3 {
            threat_distribution.medium += 1;
        } else {
            threat_distribution.low += 1;
        }

        let is_violation = entry.action == "security_violation";
        let is_high_threat = entry.threat_score > HIGH_THREAT_FLOOR;

        if is_violation {
            security_violations += 1;
            penalty += VIOLATION_PENALTY;
        } else if is_high_threat {
            penalty += HIGH_THREAT_PENALTY;
        } else if !entry.success {
            penalty += FAILURE_PENALTY;
        }

        if is_high_threat {
            high_threat_events += 1;
        }
        if !entry.success {
            failed_actions += 1;
        }
    }

    let compliance_score = (100i64 - penalty).max(0) as u32;

    let recommendations = recommendations_for(
        security_violations,
        high_threat_events,
        failed_actions,
        compliance_score,
    );

    ComplianceReport {
        period: ReportPeriod { start, end },
        summary: ReportSummary {
            total_events: entries.len(),
            security_violations,
            high_threat_events,
            user_activity,
            compliance_score,
        },
        details: ReportDetails {
            threat_distribution,
            security_levels,
            actions,
            failed_actions,
        },
        recommendations,
    }
}

fn recommendations_for(
    violations: usize,
    high_threat: usize,
    failures: usize,
    score: u32,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if violations > 5 {
        recommendations
            .push("High number of security violations; review validation rules and repeat offenders".to_string());
    }
    if high_threat > 10 {
        recommendations
            .push("Too many high-threat events; consider lowering threat thresholds or enabling throttling".to_string());
    }
    if failures > 20 {
        recommendations
            .push("Elevated failure rate; inspect backend availability and session handling".to_string());
    }
    if score < 70 {
        recommendations
            .push("Compliance score below target; schedule a security review of this period".to_string());
    }
    if recommendations.is_empty() {
        recommendations.push("No immediate action required; continue monitoring".to_string());
    }

    recommendations
}
