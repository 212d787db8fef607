//! Best-effort, out-of-band cleanup of object bodies after a DB-level
//! delete. Per §7: "the database is the source of truth for what is
//! deleted; filesystem/blob cleanup may lag."

use std::path::PathBuf;
use tracing::warn;
use ws_blob_shock::ShockClient;
use ws_sbe_fs::FsBodyStore;

/// Accumulates filesystem and blob-store bodies to remove after a batch of
/// object deletions, so cleanup can run once instead of interleaved with
/// the DB-lane removal loop.
#[derive(Debug, Default)]
pub struct RemovalRequest {
    files: Vec<PathBuf>,
    blob_urls: Vec<String>,
}

impl RemovalRequest {
    /// A request with nothing queued.
    pub fn new() -> RemovalRequest {
        RemovalRequest::default()
    }

    /// Queues a filesystem-relative path for removal.
    pub fn add_file(&mut self, rel_path: impl Into<PathBuf>) {
        self.files.push(rel_path.into());
    }

    /// Queues a blob-store node URL for removal.
    pub fn add_blob_url(&mut self, url: impl Into<String>) {
        self.blob_urls.push(url.into());
    }

    /// True if nothing was queued.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.blob_urls.is_empty()
    }

    /// Folds another request's queued bodies into this one.
    pub fn extend(&mut self, other: RemovalRequest) {
        self.files.extend(other.files);
        self.blob_urls.extend(other.blob_urls);
    }

    /// Removes every queued filesystem body, logging (not failing) on error.
    /// Blob bodies are not removed here: the blob store owns their lifecycle
    /// and the client only ever creates, reads, and sets ACLs on blob nodes.
    pub async fn execute(self, fs: &FsBodyStore, _shock: Option<&ShockClient>) {
        for file in self.files {
            if let Err(err) = fs.remove_file(&file).await {
                warn!(path = %file.display(), error = %err, "failed to remove object body during cleanup");
            }
        }
        for url in self.blob_urls {
            warn!(blob_url = %url, "blob body orphaned by delete; no Shock delete operation is exposed to reclaim it");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_request_reports_empty() {
        assert!(RemovalRequest::new().is_empty());
    }

    #[test]
    fn queuing_a_file_marks_request_nonempty() {
        let mut req = RemovalRequest::new();
        req.add_file("alice/docs/a.txt");
        assert!(!req.is_empty());
    }
}
