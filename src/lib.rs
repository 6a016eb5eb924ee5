//! # Aegis Gateway
//!
//! Security gateway for the AI-facing requests of a writing-assistance
//! product. Every request passes through one pipeline before reaching a
//! generation backend: authentication, per-tier rate limiting, content
//! validation and threat scoring, sanitization or blocking, response
//! filtering, and durable audit logging for compliance reporting.
//!
//! The gateway is a library: the calling application submits
//! [`SecureRequest`]s with a [`SecurityContext`] and renders the
//! [`SecureResponse`] (or the typed [`SecurityError`]) however it likes. UI,
//! transport, and the generation backend itself all live outside this crate;
//! the backend is reached through the [`gateway::backend::AiBackend`] trait.
//!
//! ```no_run
//! use aegis_gateway::audit::store::MemoryAuditStore;
//! use aegis_gateway::audit::AuditLogger;
//! use aegis_gateway::core::config::GatewayConfig;
//! use aegis_gateway::gateway::backend::EchoBackend;
//! use aegis_gateway::gateway::SecurityGateway;
//! use aegis_gateway::ratelimit::RateLimiterRegistry;
//! use aegis_gateway::{SecureRequest, SecurityContext, UserTier};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), aegis_gateway::SecurityError> {
//! let config = GatewayConfig::default();
//! let limiter = Arc::new(RateLimiterRegistry::new(config.tiers.clone()));
//! let audit = Arc::new(AuditLogger::new(
//!     Arc::new(MemoryAuditStore::new()),
//!     config.audit.clone(),
//! ));
//! let gateway = SecurityGateway::new(config, limiter, audit, Arc::new(EchoBackend::new()))?;
//!
//! let request = SecureRequest::new("writer-1", "session-1", "Draft an opening line.");
//! let context = SecurityContext::new(UserTier::Pro, "writer-1", "session-1");
//! let _response = gateway.handle(request, context).await?;
//! # Ok(())
//! # }
//! ```

/// Configuration, error taxonomy, and the shared data model
pub mod core;

/// Alert dispatch contract for critical events
pub mod alerts;

/// Buffered audit logging and compliance reporting
pub mod audit;

/// The request pipeline orchestrator and backend seam
pub mod gateway;

/// Logging initialization helpers
pub mod observability;

/// Per-(caller, tier) admission control
pub mod ratelimit;

/// Threat scoring
pub mod threat;

/// Content-security checks and consolidation
pub mod validation;

pub use crate::core::config::GatewayConfig;
pub use crate::core::error::{SecurityError, SecurityResult};
pub use crate::core::types::{
    SecureRequest, SecureResponse, SecurityContext, SecurityMetadata, Severity, UserTier,
    ValidationResult,
};
pub use crate::gateway::SecurityGateway;
