//! Durable storage backends for audit entries.
//!
//! The logger only needs two operations: persist a batch (all-or-nothing) and
//! query by filter. `MemoryAuditStore` backs tests and single-process
//! deployments; `JsonlAuditStore` appends JSON lines to a file the way the
//! compliance tooling expects to ingest them.

use crate::audit::{AuditLogEntry, AuditQuery};
use crate::core::error::{SecurityError, SecurityResult};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::warn;

/// Storage backend contract for audit batches.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist a batch. Either the whole batch lands or the call fails;
    /// partial writes must not be reported as success.
    async fn persist_batch(&self, entries: &[AuditLogEntry]) -> SecurityResult<()>;

    /// Return persisted entries matching the filter, oldest first.
    async fn query(&self, filter: &AuditQuery) -> SecurityResult<Vec<AuditLogEntry>>;
}

/// In-memory store.
#[derive(Default)]
pub struct MemoryAuditStore {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn persist_batch(&self, entries: &[AuditLogEntry]) -> SecurityResult<()> {
        let mut store = self.entries.write().await;
        store.extend_from_slice(entries);
        Ok(())
    }

    async fn query(&self, filter: &AuditQuery) -> SecurityResult<Vec<AuditLogEntry>> {
        let store = self.entries.read().await;
        Ok(store
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect())
    }
}

/// Append-only JSON-lines file store.
pub struct JsonlAuditStore {
    path: PathBuf,
}

impl JsonlAuditStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AuditStore for JsonlAuditStore {
    async fn persist_batch(&self, entries: &[AuditLogEntry]) -> SecurityResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                SecurityError::persistence(format!("failed to create audit directory: {}", e))
            })?;
        }

        // Serialize the whole batch before touching the file so a bad entry
        // cannot leave a partial batch behind.
        let mut payload = String::new();
        for entry in entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                SecurityError::persistence(format!("failed to serialize audit entry: {}", e))
            })?;
            payload.push_str(&line);
            payload.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                SecurityError::persistence(format!("failed to open audit file: {}", e))
            })?;

        file.write_all(payload.as_bytes()).await.map_err(|e| {
            SecurityError::persistence(format!("failed to write audit batch: {}", e))
        })?;
        file.flush()
            .await
            .map_err(|e| SecurityError::persistence(format!("failed to flush audit file: {}", e)))?;

        Ok(())
    }

    async fn query(&self, filter: &AuditQuery) -> SecurityResult<Vec<AuditLogEntry>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SecurityError::persistence(format!(
                    "failed to read audit file: {}",
                    e
                )))
            }
        };

        let mut entries = Vec::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditLogEntry>(line) {
                Ok(entry) => {
                    if filter.matches(&entry) {
                        entries.push(entry);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "skipping unparseable audit record");
                }
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Severity;

    fn entry(action: &str) -> AuditLogEntry {
        AuditLogEntry::new("writer-1", action, "ai_gateway", true)
            .with_security_level(Severity::Low)
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryAuditStore::new();
        store
            .persist_batch(&[entry("ai_request"), entry("security_violation")])
            .await
            .unwrap();

        let all = store.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let violations = store
            .query(&AuditQuery::default().with_action("security_violation"))
            .await
            .unwrap();
        assert_eq!(violations.len(), 1);
    }

    #[tokio::test]
    async fn jsonl_store_persists_and_queries() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlAuditStore::new(dir.path().join("audit.jsonl"));

        store.persist_batch(&[entry("ai_request")]).await.unwrap();
        store.persist_batch(&[entry("ai_request")]).await.unwrap();

        let all = store.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].action, "ai_request");
    }

    #[tokio::test]
    async fn jsonl_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlAuditStore::new(dir.path().join("nonexistent.jsonl"));
        let all = store.query(&AuditQuery::default()).await.unwrap();
        assert!(all.is_empty());
    }

    #[tokio::test]
    async fn jsonl_store_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let store = JsonlAuditStore::new(path.clone());

        store.persist_batch(&[entry("ai_request")]).await.unwrap();
        tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap()
            .write_all(b"not json\n")
            .await
            .unwrap();
        store.persist_batch(&[entry("ai_request")]).await.unwrap();

        let all = store.query(&AuditQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
