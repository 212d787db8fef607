//! Filesystem-backed storage for workspace object bodies.
//!
//! Every operation is confined to a root directory via [`cap_std`]'s
//! ambient-authority sandboxing, so callers can never escape the configured
//! storage root no matter what path an object record carries.
//!
//! `cap_std::fs::Dir` is a synchronous API; every call here is dispatched
//! through [`tokio::task::spawn_blocking`] so the async runtime's worker
//! threads are never blocked on disk I/O.

use cap_std::fs::Dir;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by the filesystem body store.
#[derive(Debug, Error)]
pub enum FsError {
    /// The underlying filesystem operation failed.
    #[error("filesystem error: {0}")]
    Io(#[from] io::Error),
    /// The background task running the operation was cancelled or panicked.
    #[error("body store worker unavailable")]
    WorkerGone,
}

/// Stores and retrieves object bodies under a sandboxed root directory.
#[derive(Clone)]
pub struct FsBodyStore {
    root: Arc<Dir>,
}

impl FsBodyStore {
    /// Opens (creating if necessary) `root` as the body store's sandbox.
    pub fn new(root: PathBuf) -> io::Result<FsBodyStore> {
        std::fs::create_dir_all(&root)?;
        let dir = Dir::open_ambient_dir(&root, cap_std::ambient_authority())?;
        Ok(FsBodyStore { root: Arc::new(dir) })
    }

    /// Creates `rel` and all of its missing parent directories.
    pub async fn create_dir_all(&self, rel: &Path) -> Result<(), FsError> {
        let root = self.root.clone();
        let rel = rel.to_path_buf();
        run_blocking(move || create_dir_all(&root, &rel)).await
    }

    /// Writes `data` to `rel` atomically: the bytes land in a sibling
    /// temporary file first, which is then renamed over the final path, so
    /// concurrent readers never observe a partially written body.
    pub async fn write_atomic(&self, rel: &Path, data: Vec<u8>) -> Result<(), FsError> {
        let root = self.root.clone();
        let rel = rel.to_path_buf();
        run_blocking(move || {
            if let Some(parent) = rel.parent() {
                if !parent.as_os_str().is_empty() {
                    create_dir_all(&root, parent)?;
                }
            }
            let tmp_name = format!(
                "{}.tmp-{}",
                rel.file_name().and_then(|n| n.to_str()).unwrap_or("body"),
                uuid::Uuid::new_v4()
            );
            let tmp_rel = rel.with_file_name(tmp_name);
            root.write(&tmp_rel, &data)?;
            root.rename(&tmp_rel, &root, &rel)?;
            Ok(())
        })
        .await
    }

    /// Reads the full contents of `rel`.
    pub async fn read(&self, rel: &Path) -> Result<Vec<u8>, FsError> {
        let root = self.root.clone();
        let rel = rel.to_path_buf();
        run_blocking(move || Ok(root.read(&rel)?)).await
    }

    /// Removes a single file at `rel`.
    pub async fn remove_file(&self, rel: &Path) -> Result<(), FsError> {
        let root = self.root.clone();
        let rel = rel.to_path_buf();
        run_blocking(move || Ok(root.remove_file(&rel)?)).await
    }

    /// Removes an empty directory at `rel`. Callers are responsible for
    /// verifying emptiness at the metadata level before calling this.
    pub async fn remove_dir(&self, rel: &Path) -> Result<(), FsError> {
        let root = self.root.clone();
        let rel = rel.to_path_buf();
        run_blocking(move || Ok(root.remove_dir(&rel)?)).await
    }

    /// Moves `from` to `to` within the sandbox, creating `to`'s parent directories first.
    pub async fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        let root = self.root.clone();
        let (from, to) = (from.to_path_buf(), to.to_path_buf());
        run_blocking(move || {
            if let Some(parent) = to.parent() {
                if !parent.as_os_str().is_empty() {
                    create_dir_all(&root, parent)?;
                }
            }
            root.rename(&from, &root, &to)?;
            Ok(())
        })
        .await
    }

    /// Copies the body at `from` to `to`, creating `to`'s parent directories first.
    pub async fn copy(&self, from: &Path, to: &Path) -> Result<u64, FsError> {
        let root = self.root.clone();
        let (from, to) = (from.to_path_buf(), to.to_path_buf());
        run_blocking(move || {
            if let Some(parent) = to.parent() {
                if !parent.as_os_str().is_empty() {
                    create_dir_all(&root, parent)?;
                }
            }
            let data = root.read(&from)?;
            let len = data.len() as u64;
            root.write(&to, &data)?;
            Ok(len)
        })
        .await
    }
}

fn create_dir_all(root: &Dir, rel: &Path) -> io::Result<()> {
    let mut built = PathBuf::new();
    for component in rel.components() {
        built.push(component);
        match root.create_dir(&built) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

async fn run_blocking<F, T>(f: F) -> Result<T, FsError>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let joined = tokio::task::spawn_blocking(f).await.map_err(|err| {
        tracing::warn!(%err, "blocking filesystem task did not complete");
        FsError::WorkerGone
    })?;
    joined.map_err(FsError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBodyStore::new(dir.path().to_path_buf()).unwrap();
        let rel = Path::new("alice/docs/a.txt");
        store.write_atomic(rel, b"hello".to_vec()).await.unwrap();
        let data = store.read(rel).await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn create_dir_all_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBodyStore::new(dir.path().to_path_buf()).unwrap();
        let rel = Path::new("alice/docs/nested");
        store.create_dir_all(rel).await.unwrap();
        store.create_dir_all(rel).await.unwrap();
    }

    #[tokio::test]
    async fn rename_moves_body() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBodyStore::new(dir.path().to_path_buf()).unwrap();
        store.write_atomic(Path::new("a.txt"), b"v1".to_vec()).await.unwrap();
        store.rename(Path::new("a.txt"), Path::new("sub/b.txt")).await.unwrap();
        let data = store.read(Path::new("sub/b.txt")).await.unwrap();
        assert_eq!(data, b"v1");
    }
}
