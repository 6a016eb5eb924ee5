//! # Security Gateway
//!
//! Orchestrates the full request pipeline: authenticate → rate-limit →
//! validate → threat-assess → sanitize → forward → filter response → audit.
//!
//! Every stage returns a typed `Result`; the gateway pattern-matches the
//! error kind to write the matching failure audit entry before the error
//! propagates, so each request that enters produces exactly one terminal
//! audit entry whether it succeeds or not. The gateway itself holds no
//! cross-request state beyond the injected limiter registry and audit
//! buffer, plus the blocked-caller and risk ledgers, so pipeline
//! invocations parallelize freely.

pub mod backend;
pub(crate) mod sanitize;

use crate::alerts::{AlertDispatcher, TracingAlertDispatcher};
use crate::audit::{AuditLogEntry, AuditLogger};
use crate::core::config::GatewayConfig;
use crate::core::error::{SecurityError, SecurityResult};
use crate::core::types::{
    ComplianceStatus, RiskProfile, SecureRequest, SecureResponse, SecurityContext,
    SecurityMetadata, Severity, UserTier, ValidationResult,
};
use crate::ratelimit::{ActivityClass, RateLimiterRegistry};
use crate::threat::{HeuristicThreatScorer, ThreatScorer};
use crate::validation::InputValidator;
use backend::AiBackend;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use metrics::{counter, histogram};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Amount added to a caller's risk score per validation failure.
const RISK_ESCALATION_STEP: f64 = 0.2;

/// The security gateway.
///
/// Construct with [`SecurityGateway::new`]; the limiter registry, audit
/// logger, and backend are injected so tests and deployments choose their
/// own lifecycles.
pub struct SecurityGateway {
    config: GatewayConfig,
    limiter: Arc<RateLimiterRegistry>,
    validator: InputValidator,
    scorer: Arc<dyn ThreatScorer>,
    audit: Arc<AuditLogger>,
    alerts: Arc<dyn AlertDispatcher>,
    backend: Arc<dyn AiBackend>,
    blocked_callers: DashMap<String, DateTime<Utc>>,
    risk_ledger: DashMap<String, RiskProfile>,
}

impl SecurityGateway {
    /// Build a gateway over the injected collaborators.
    ///
    /// The default threat scorer is the reference heuristic and the default
    /// alert dispatcher logs per enabled channel; both are replaceable via
    /// the `with_*` builders.
    pub fn new(
        config: GatewayConfig,
        limiter: Arc<RateLimiterRegistry>,
        audit: Arc<AuditLogger>,
        backend: Arc<dyn AiBackend>,
    ) -> SecurityResult<Self> {
        config.validate()?;

        let validator = InputValidator::new(config.tiers.clone());
        let alerts: Arc<dyn AlertDispatcher> =
            Arc::new(TracingAlertDispatcher::new(config.alerts.clone()));

        Ok(Self {
            validator,
            limiter,
            scorer: Arc::new(HeuristicThreatScorer::new()),
            audit,
            alerts,
            backend,
            blocked_callers: DashMap::new(),
            risk_ledger: DashMap::new(),
            config,
        })
    }

    /// Replace the threat scorer (e.g. with a trained classifier).
    pub fn with_scorer(mut self, scorer: Arc<dyn ThreatScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Replace the alert dispatcher.
    pub fn with_alerts(mut self, alerts: Arc<dyn AlertDispatcher>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Run the full pipeline for one request.
    pub async fn handle(
        &self,
        request: SecureRequest,
        context: SecurityContext,
    ) -> SecurityResult<SecureResponse> {
        counter!("gateway_requests_total").increment(1);
        let resource = request
            .target_module
            .clone()
            .unwrap_or_else(|| "ai_gateway".to_string());

        match self.run_pipeline(&request, &context, &resource).await {
            Ok(response) => Ok(response),
            Err(error) => {
                let threat_score = match &error {
                    SecurityError::ThreatCritical { score, .. } => *score,
                    _ => 0.0,
                };
                self.audit.record(
                    AuditLogEntry::new(&request.user_id, "ai_request_failed", &resource, false)
                        .with_security_level(error.audit_severity())
                        .with_threat_score(threat_score)
                        .with_metadata(json!({
                            "error_type": error.error_type(),
                            "detail": error.to_string(),
                        }))
                        .with_origin(
                            &context.source_ip,
                            context.user_agent.clone(),
                            &request.session_id,
                        ),
                );
                warn!(
                    request_id = %request.request_id,
                    user_id = %request.user_id,
                    error_type = error.error_type(),
                    "request rejected"
                );
                Err(error)
            }
        }
    }

    /// Standard rate-limit headers for a caller, for the transport layer to
    /// attach to responses.
    pub fn rate_limit_headers(&self, user_id: &str, tier: UserTier) -> HashMap<String, String> {
        self.limiter.headers(user_id, tier)
    }

    /// The audit logger, for queries and compliance reporting.
    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    /// Drain the audit buffer and stop its flush task.
    pub async fn shutdown(&self) -> SecurityResult<usize> {
        self.audit.shutdown().await
    }

    async fn run_pipeline(
        &self,
        request: &SecureRequest,
        context: &SecurityContext,
        resource: &str,
    ) -> SecurityResult<SecureResponse> {
        let mut audit_trail: Vec<String> = Vec::new();

        // Stage 1: authenticate.
        self.authenticate(request, context)?;
        audit_trail.push("authenticated".to_string());

        // Stage 2: rate limit.
        let decision = self.limiter.try_acquire(&request.user_id, context.tier);
        if !decision.allowed {
            let retry_after_secs = decision
                .retry_after
                .map(|d| d.as_secs())
                .unwrap_or(1)
                .max(1);
            return Err(SecurityError::RateLimitExceeded { retry_after_secs });
        }
        audit_trail.push(format!("rate limit ok ({} remaining)", decision.remaining));

        // Stage 3: validate.
        let validation = self.validator.validate(request, context);
        if !validation.passed {
            self.record_violation(request, context, resource, &validation);
            self.escalate_risk(&request.user_id, &context.risk_profile);

            if validation.risk_level >= Severity::Critical {
                self.alerts
                    .trigger_alert(
                        "content_security",
                        validation.risk_level,
                        "critical content violation detected",
                        json!({
                            "user_id": request.user_id,
                            "request_id": request.request_id,
                            "violations": validation.violations.len(),
                        }),
                    )
                    .await;
            }

            // Violations the sanitizer can repair ride along to stage 5;
            // anything it cannot repair aborts here.
            if !validation.violations.iter().all(sanitize::is_sanitizable) {
                return Err(SecurityError::ValidationFailed {
                    violations: validation.violations.clone(),
                    risk_level: validation.risk_level,
                });
            }
            audit_trail.push(format!(
                "validation flagged {} sanitizable violation(s)",
                validation.violations.len()
            ));
        } else {
            audit_trail.push(format!("validation passed (score {:.2})", validation.score));
        }

        // Stage 4: threat assessment against the merged risk picture.
        let assessed_context = self.context_with_tracked_risk(context);
        let threat_score = self.scorer.score(request, &assessed_context);

        if threat_score > self.config.threat.critical_threshold {
            let blocked_until = Utc::now()
                + chrono::Duration::from_std(self.config.threat.block_duration)
                    .unwrap_or_else(|_| chrono::Duration::hours(24));
            self.blocked_callers
                .insert(request.user_id.clone(), blocked_until);
            self.record_threat_event(request, context, resource, threat_score);
            self.alerts
                .trigger_alert(
                    "threat",
                    Severity::Critical,
                    "caller blocked after critical threat score",
                    json!({
                        "user_id": request.user_id,
                        "score": threat_score,
                        "blocked_until": blocked_until,
                    }),
                )
                .await;
            return Err(SecurityError::ThreatCritical {
                score: threat_score,
                blocked_until,
            });
        }

        if threat_score > self.config.threat.high_threshold {
            self.record_threat_event(request, context, resource, threat_score);
            if self.config.threat.throttle_on_high {
                self.limiter
                    .set_activity(&request.user_id, ActivityClass::Suspicious);
                audit_trail.push("high threat: caller throttled".to_string());
            } else {
                audit_trail.push("high threat: logged".to_string());
            }
        }

        // Stage 5: sanitize. Only the spans validation already identified are
        // touched; no second validation pass.
        let ceiling = self.config.tiers.for_tier(context.tier).max_content_length;
        let sanitized = if validation.violations.is_empty() {
            request.clone()
        } else {
            let cleaned =
                sanitize::sanitize_content(&request.content, &validation.violations, ceiling);
            audit_trail.push(format!(
                "sanitized {} violation(s)",
                validation.violations.len()
            ));
            request.with_content(cleaned)
        };

        // Stage 6: forward, under the overall timeout. Latency is recorded
        // whether or not the call succeeds.
        let started = Instant::now();
        let forwarded = tokio::time::timeout(
            self.config.forward_timeout,
            self.backend.generate(&sanitized),
        )
        .await;
        let elapsed = started.elapsed();
        histogram!("gateway_forward_duration_seconds").record(elapsed.as_secs_f64());

        let backend_response = match forwarded {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(SecurityError::forwarding(e.to_string())),
            Err(_) => {
                return Err(SecurityError::forwarding(format!(
                    "backend timed out after {:?}",
                    self.config.forward_timeout
                )))
            }
        };
        debug!(
            request_id = %request.request_id,
            model = %backend_response.model,
            elapsed_ms = elapsed.as_millis() as u64,
            "backend call completed"
        );

        // Stage 7: filter the response for the caller's tier.
        let filtered = sanitize::filter_response(&backend_response.content, context.tier);
        audit_trail.push("response filtered".to_string());

        // Stage 8: terminal success entry, then hand the response back.
        self.audit.record(
            AuditLogEntry::new(&request.user_id, "ai_request", resource, true)
                .with_security_level(validation.risk_level)
                .with_threat_score(threat_score)
                .with_metadata(json!({
                    "validation_score": validation.score,
                    "forward_ms": elapsed.as_millis() as u64,
                    "encryption": encryption_level(context.tier),
                    "compliance": "evaluated",
                }))
                .with_origin(
                    &context.source_ip,
                    context.user_agent.clone(),
                    &request.session_id,
                ),
        );
        info!(
            request_id = %request.request_id,
            user_id = %request.user_id,
            threat_score,
            "request served"
        );

        Ok(SecureResponse {
            content: filtered,
            confidence: backend_response.confidence,
            backend_model: backend_response.model,
            usage: backend_response.usage,
            cached: backend_response.cached,
            security_level: validation.risk_level,
            request_id: request.request_id.clone(),
            security_metadata: SecurityMetadata {
                validation_score: validation.score,
                threat_score,
                encryption_level: encryption_level(context.tier).to_string(),
                audit_trail,
                compliance_status: ComplianceStatus::for_tier(context.tier),
            },
        })
    }

    fn authenticate(
        &self,
        request: &SecureRequest,
        context: &SecurityContext,
    ) -> SecurityResult<()> {
        if request.user_id.trim().is_empty() {
            return Err(SecurityError::auth("missing caller id"));
        }

        if let Some(entry) = self.blocked_callers.get(&request.user_id) {
            let blocked_until = *entry.value();
            drop(entry);
            if Utc::now() < blocked_until {
                return Err(SecurityError::ThreatCritical {
                    score: 1.0,
                    blocked_until,
                });
            }
            // Block elapsed; forget it.
            self.blocked_callers.remove(&request.user_id);
        }

        if request.session_id.trim().is_empty() {
            return Err(SecurityError::session("missing session id"));
        }
        if context.session.id != request.session_id {
            return Err(SecurityError::session("session does not match request"));
        }
        if context.session.user_id != request.user_id {
            return Err(SecurityError::session("session not bound to caller"));
        }
        if !context.session.is_valid_at(Utc::now()) {
            return Err(SecurityError::session("session expired"));
        }

        Ok(())
    }

    fn record_violation(
        &self,
        request: &SecureRequest,
        context: &SecurityContext,
        resource: &str,
        validation: &ValidationResult,
    ) {
        self.audit.record(
            AuditLogEntry::new(&request.user_id, "security_violation", resource, false)
                .with_security_level(validation.risk_level)
                .with_metadata(json!({
                    "violations": validation.violations,
                    "recommendations": validation.recommendations,
                    "score": validation.score,
                }))
                .with_origin(
                    &context.source_ip,
                    context.user_agent.clone(),
                    &request.session_id,
                ),
        );
    }

    fn record_threat_event(
        &self,
        request: &SecureRequest,
        context: &SecurityContext,
        resource: &str,
        threat_score: f64,
    ) {
        self.audit.record(
            AuditLogEntry::new(&request.user_id, "high_threat_detected", resource, true)
                .with_security_level(if threat_score > self.config.threat.critical_threshold {
                    Severity::Critical
                } else {
                    Severity::High
                })
                .with_threat_score(threat_score)
                .with_metadata(json!({ "content_length": request.content.len() }))
                .with_origin(
                    &context.source_ip,
                    context.user_agent.clone(),
                    &request.session_id,
                ),
        );
    }

    /// Raise the tracked risk for a caller after a violation. The ledger
    /// merge keeps the highest known score; nothing is overwritten
    /// destructively.
    fn escalate_risk(&self, user_id: &str, supplied: &RiskProfile) {
        let now = Utc::now();
        let mut entry = self.risk_ledger.entry(user_id.to_string()).or_default();
        let updated = entry.merged_with(supplied).escalated(RISK_ESCALATION_STEP, now);
        *entry = updated;
    }

    fn context_with_tracked_risk(&self, context: &SecurityContext) -> SecurityContext {
        let mut assessed = context.clone();
        if let Some(tracked) = self.risk_ledger.get(&context.session.user_id) {
            assessed.risk_profile = context.risk_profile.merged_with(tracked.value());
        }
        assessed
    }
}

fn encryption_level(tier: UserTier) -> &'static str {
    match tier {
        UserTier::Admin => "enhanced",
        _ => "standard",
    }
}
