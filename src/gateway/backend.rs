//! Generation backend seam.
//!
//! The backend is an opaque downstream collaborator: the gateway hands it a
//! sanitized request and gets content back. Anything slower than the
//! configured forward timeout surfaces as a forwarding failure upstream.

use crate::core::error::SecurityResult;
use crate::core::types::{SecureRequest, TokenUsage};
use async_trait::async_trait;

/// Raw output of a generation call, before response filtering.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub content: String,
    pub confidence: f64,
    pub model: String,
    pub usage: TokenUsage,
    pub cached: bool,
}

/// Downstream AI generation backend.
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Generate a completion for an already-sanitized request.
    async fn generate(&self, request: &SecureRequest) -> SecurityResult<BackendResponse>;
}

/// Backend that echoes the sanitized content back.
///
/// Useful for tests and for wiring the pipeline before a real model
/// integration exists: what comes out is exactly what sanitization let
/// through.
#[derive(Debug, Default)]
pub struct EchoBackend;

impl EchoBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AiBackend for EchoBackend {
    async fn generate(&self, request: &SecureRequest) -> SecurityResult<BackendResponse> {
        let tokens = (request.content.len() / 4) as u32;
        Ok(BackendResponse {
            content: request.content.clone(),
            confidence: 1.0,
            model: "echo".to_string(),
            usage: TokenUsage {
                prompt_tokens: tokens,
                completion_tokens: tokens,
                total_tokens: tokens * 2,
            },
            cached: false,
        })
    }
}
