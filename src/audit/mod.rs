//! # Audit Logging System
//!
//! Buffers structured security events and flushes them in batches to durable
//! storage, with retry on failure; derives compliance reports from history.
//!
//! ## Architecture
//! `record()` is fire-and-forget: it appends to an in-process buffer and
//! returns. A dedicated background task flushes the buffer to the injected
//! [`store::AuditStore`] when the buffer fills or a periodic timer fires.
//! Batches are all-or-nothing: a failed batch is pushed back to the front of
//! the buffer for the next flush trigger, never dropped silently, and the
//! failure stays invisible to the request that produced the entries.
//! `shutdown()` stops the task and drains the queue deterministically.

pub mod compliance;
pub mod store;

use crate::core::error::SecurityResult;
use crate::core::types::Severity;
use chrono::{DateTime, Utc};
use compliance::ComplianceReport;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use store::AuditStore;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use crate::core::config::AuditSettings;

/// Immutable record of one security decision.
///
/// Append-only: entries are never edited after creation, only superseded by
/// new entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub action: String,
    pub resource: String,
    pub success: bool,
    pub security_level: Severity,
    pub threat_score: f64,
    pub metadata: serde_json::Value,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub session_id: String,
}

impl AuditLogEntry {
    /// Create an entry with a generated id and current timestamp.
    pub fn new(
        user_id: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        success: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            user_id: user_id.into(),
            action: action.into(),
            resource: resource.into(),
            success,
            security_level: Severity::Low,
            threat_score: 0.0,
            metadata: serde_json::Value::Null,
            ip_address: String::new(),
            user_agent: None,
            session_id: String::new(),
        }
    }

    pub fn with_security_level(mut self, level: Severity) -> Self {
        self.security_level = level;
        self
    }

    pub fn with_threat_score(mut self, score: f64) -> Self {
        self.threat_score = score;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_origin(
        mut self,
        ip_address: impl Into<String>,
        user_agent: Option<String>,
        session_id: impl Into<String>,
    ) -> Self {
        self.ip_address = ip_address.into();
        self.user_agent = user_agent;
        self.session_id = session_id.into();
        self
    }
}

/// Filter for audit queries. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    pub user_id: Option<String>,
    pub action: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub only_failures: bool,
}

impl AuditQuery {
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn failures_only(mut self) -> Self {
        self.only_failures = true;
        self
    }

    /// Whether an entry satisfies this filter.
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(ref user_id) = self.user_id {
            if &entry.user_id != user_id {
                return false;
            }
        }
        if let Some(ref action) = self.action {
            if &entry.action != action {
                return false;
            }
        }
        if let Some(start) = self.start {
            if entry.timestamp < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if entry.timestamp > end {
                return false;
            }
        }
        if self.only_failures && entry.success {
            return false;
        }
        true
    }
}

struct LoggerInner {
    buffer: Mutex<VecDeque<AuditLogEntry>>,
    store: Arc<dyn AuditStore>,
    capacity: usize,
    flush_signal: Notify,
    shutting_down: AtomicBool,
}

impl LoggerInner {
    /// Drain the buffer and persist it as one batch. On failure the batch
    /// goes back to the front so ordering survives the retry.
    async fn flush_once(&self) -> SecurityResult<usize> {
        let batch: Vec<AuditLogEntry> = {
            let mut buffer = self.buffer.lock();
            buffer.drain(..).collect()
        };

        if batch.is_empty() {
            return Ok(0);
        }

        match self.store.persist_batch(&batch).await {
            Ok(()) => {
                debug!(entries = batch.len(), "audit batch persisted");
                Ok(batch.len())
            }
            Err(e) => {
                let requeued = batch.len();
                {
                    let mut buffer = self.buffer.lock();
                    for entry in batch.into_iter().rev() {
                        buffer.push_front(entry);
                    }
                }
                warn!(error = %e, requeued, "audit flush failed, batch requeued");
                Err(e)
            }
        }
    }
}

/// Buffered, background-flushing audit logger.
pub struct AuditLogger {
    inner: Arc<LoggerInner>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
}

impl AuditLogger {
    /// Create a logger over `store` and start its flush task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(store: Arc<dyn AuditStore>, settings: AuditSettings) -> Self {
        let inner = Arc::new(LoggerInner {
            buffer: Mutex::new(VecDeque::with_capacity(settings.buffer_capacity)),
            store,
            capacity: settings.buffer_capacity,
            flush_signal: Notify::new(),
            shutting_down: AtomicBool::new(false),
        });

        let task_inner = inner.clone();
        let flush_interval = settings.flush_interval;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(flush_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; consume it so the loop
            // waits a full interval before its first timed flush.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = task_inner.flush_signal.notified() => {}
                }

                if task_inner.shutting_down.load(Ordering::Acquire) {
                    break;
                }

                // Failures are already requeued inside flush_once; the next
                // trigger retries them.
                let _ = task_inner.flush_once().await;
            }
        });

        Self {
            inner,
            flush_task: Mutex::new(Some(handle)),
        }
    }

    /// Append an entry. Fire-and-forget: the append succeeds immediately and
    /// any flush failure only affects durability timing, never the caller.
    pub fn record(&self, entry: AuditLogEntry) {
        let should_flush = {
            let mut buffer = self.inner.buffer.lock();
            buffer.push_back(entry);
            buffer.len() >= self.inner.capacity
        };

        if should_flush {
            self.inner.flush_signal.notify_one();
        }
    }

    /// Flush everything currently buffered. Returns how many entries were
    /// persisted; a persistence error leaves them queued for retry.
    pub async fn flush(&self) -> SecurityResult<usize> {
        self.inner.flush_once().await
    }

    /// Entries matching the filter: persisted history plus anything still
    /// buffered, oldest first.
    pub async fn query(&self, filter: &AuditQuery) -> SecurityResult<Vec<AuditLogEntry>> {
        let mut entries = self.inner.store.query(filter).await?;

        let buffered: Vec<AuditLogEntry> = {
            let buffer = self.inner.buffer.lock();
            buffer
                .iter()
                .filter(|entry| filter.matches(entry))
                .cloned()
                .collect()
        };
        entries.extend(buffered);

        Ok(entries)
    }

    /// Number of entries awaiting flush.
    pub fn buffered(&self) -> usize {
        self.inner.buffer.lock().len()
    }

    /// Derive a compliance report for a time range, optionally scoped to one
    /// caller.
    pub async fn compliance_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        user_id: Option<&str>,
    ) -> SecurityResult<ComplianceReport> {
        let mut filter = AuditQuery::default().with_range(start, end);
        if let Some(user_id) = user_id {
            filter = filter.with_user(user_id);
        }

        let entries = self.query(&filter).await?;
        Ok(compliance::generate(&entries, start, end))
    }

    /// Stop the flush task and drain the buffer.
    pub async fn shutdown(&self) -> SecurityResult<usize> {
        self.inner.shutting_down.store(true, Ordering::Release);
        self.inner.flush_signal.notify_one();

        let handle = self.flush_task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let drained = self.inner.flush_once().await?;
        info!(drained, "audit logger drained on shutdown");
        Ok(drained)
    }
}
