//! Pending-upload reconciliation (§4.4): objects created with
//! `createUploadNodes=true` have no known size until the blob store finishes
//! receiving the body and computes a checksum. This polls the blob store
//! every five seconds and writes back the observed size once one appears,
//! grounded on `examples/original_source/PendingUpload.h`'s `age`/`set_size`
//! bookkeeping.

use crate::db::Repository;
use crate::lanes::SerializationLane;
use crate::metrics;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use ws_blob_shock::ShockClient;
use ws_core::PendingUpload;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// The set of objects awaiting size reconciliation, keyed by `object_id`.
#[derive(Clone, Default)]
pub struct PendingUploads {
    entries: Arc<DashMap<String, PendingUpload>>,
}

impl PendingUploads {
    /// An empty set.
    pub fn new() -> PendingUploads {
        PendingUploads::default()
    }

    /// Registers a freshly created upload-pending object.
    pub fn insert(&self, object_id: String, shock_url: String, auth_token: String) {
        self.entries.insert(
            object_id.clone(),
            PendingUpload {
                object_id,
                shock_url,
                auth_token,
                size: 0,
                updated: false,
                creation_time: Instant::now(),
            },
        );
    }

    /// Removes and returns an entry once it's been reconciled.
    pub fn remove(&self, object_id: &str) -> Option<PendingUpload> {
        self.entries.remove(object_id).map(|(_, v)| v)
    }

    /// How many uploads are still awaiting reconciliation.
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Spawns the poll loop as a background task. The returned handle is never
/// joined in normal operation; it runs for the lifetime of the process.
pub fn spawn(pending: PendingUploads, repo: Repository, shock: ShockClient, serialization: SerializationLane) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        loop {
            interval.tick().await;
            reconcile_once(&pending, &repo, &shock, &serialization).await;
        }
    })
}

async fn reconcile_once(pending: &PendingUploads, repo: &Repository, shock: &ShockClient, serialization: &SerializationLane) {
    let object_ids: Vec<String> = pending.entries.iter().map(|entry| entry.key().clone()).collect();
    let mut found_updates = false;

    for object_id in object_ids {
        let Some(upload) = pending.entries.get(&object_id).map(|entry| entry.value().clone()) else {
            continue;
        };
        let node = match shock.get_node(&upload.auth_token, &upload.shock_url).await {
            Ok(node) => node,
            Err(err) => {
                debug!(object_id = %object_id, error = %err, "pending upload node not yet reachable");
                continue;
            }
        };
        let Some(size) = observed_size(&node) else {
            continue;
        };
        found_updates = true;
        let repo = repo.clone();
        let oid = object_id.clone();
        let result = serialization.run(async move { repo.set_object_size(&oid, size).await }).await.and_then(|r| r);
        match result {
            Ok(()) => {
                pending.remove(&object_id);
            }
            Err(err) => {
                warn!(object_id = %object_id, error = %err, "failed to write back reconciled size");
            }
        }
    }

    metrics::add_reconcile_tick_metric(found_updates);
    metrics::set_pending_uploads_metric(pending.len() as i64);
}

/// The blob store reports a `file.checksum` object once the upload is fully
/// received; until then `file.size` (if present at all) is provisional.
fn observed_size(node: &Value) -> Option<u64> {
    let file = node.get("file")?;
    let has_checksum = file.get("checksum").and_then(Value::as_object).is_some_and(|m| !m.is_empty());
    if !has_checksum {
        return None;
    }
    file.get("size").and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn observed_size_requires_checksum() {
        let node = json!({ "file": { "size": 42 } });
        assert_eq!(observed_size(&node), None);
    }

    #[test]
    fn observed_size_returns_size_once_checksum_present() {
        let node = json!({ "file": { "size": 42, "checksum": { "md5": "abc" } } });
        assert_eq!(observed_size(&node), Some(42));
    }

    #[test]
    fn pending_uploads_insert_then_remove() {
        let pending = PendingUploads::new();
        pending.insert("o1".to_string(), "http://shock/node/1".to_string(), "token".to_string());
        assert_eq!(pending.len(), 1);
        let removed = pending.remove("o1").unwrap();
        assert_eq!(removed.object_id, "o1");
        assert_eq!(pending.len(), 0);
    }
}
