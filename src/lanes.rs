//! The concurrency lanes service methods post work onto (§5).
//!
//! The original service used a cancellable timer as a generic "wait for
//! completion" signal from a worker thread back to a request coroutine
//! (§9's "timer-as-wait-primitive" redesign note). Here every lane hands the
//! poster a [`tokio::sync::oneshot`] receiver instead: the worker sends its
//! result down the channel when done, and the poster simply `.await`s it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use ws_core::{Error, ErrorKind};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// A bounded-concurrency worker pool for DB operations that need not observe
/// a global order with respect to one another (reads, and writes that only
/// touch a single record): `ls`, `get`, `list_permissions`, `get_download_url`,
/// `delete`.
#[derive(Clone)]
pub struct GeneralLane {
    permits: Arc<Semaphore>,
}

impl GeneralLane {
    /// Builds a lane admitting up to `workers` concurrent operations.
    pub fn new(workers: u32) -> GeneralLane {
        GeneralLane {
            permits: Arc::new(Semaphore::new(workers.max(1) as usize)),
        }
    }

    /// Runs `job` once a worker slot is free, returning its result.
    pub async fn run<F, T>(&self, job: F) -> T
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self.permits.clone().acquire_owned().await.expect("general lane semaphore never closed");
        job.await
    }
}

/// A single dedicated worker that drains posted jobs strictly in FIFO order,
/// used for everything that must observe a total order with respect to
/// other mutations of the same hierarchy: `create`, `copy`/`move`,
/// `set_permissions`, `update_metadata`, and the reconciler's `set_object_size`.
#[derive(Clone)]
pub struct SerializationLane {
    tx: mpsc::UnboundedSender<BoxFuture>,
}

impl SerializationLane {
    /// Spawns the lane's worker task and returns a handle to post work to it.
    pub fn spawn() -> SerializationLane {
        let (tx, mut rx) = mpsc::unbounded_channel::<BoxFuture>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job.await;
            }
        });
        SerializationLane { tx }
    }

    /// Posts `job` onto the lane and awaits its completion. Jobs posted
    /// earlier by other callers complete first, preserving I3/I4.
    pub async fn run<F, T>(&self, job: F) -> Result<T, ws_core::Error>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let fut: BoxFuture = Box::pin(async move {
            let result = job.await;
            let _ = done_tx.send(result);
        });
        self.tx
            .send(fut)
            .map_err(|_| Error::from(ErrorKind::Internal))?;
        done_rx.await.map_err(|_| Error::from(ErrorKind::Internal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn general_lane_runs_jobs_and_returns_results() {
        let lane = GeneralLane::new(2);
        let result = lane.run(async { 1 + 1 }).await;
        assert_eq!(result, 2);
    }

    #[tokio::test]
    async fn serialization_lane_preserves_posting_order() {
        let lane = SerializationLane::spawn();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let counter = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for i in 0..10 {
            let lane = lane.clone();
            let order = order.clone();
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                // Stagger posting slightly so order isn't trivially guaranteed
                // by scheduling alone; the lane itself must still serialize.
                while counter.load(Ordering::SeqCst) != i {
                    tokio::task::yield_now().await;
                }
                counter.fetch_add(1, Ordering::SeqCst);
                lane.run({
                    let order = order.clone();
                    async move {
                        order.lock().unwrap().push(i);
                    }
                })
                .await
                .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let observed = order.lock().unwrap().clone();
        assert_eq!(observed, (0..10).collect::<Vec<_>>());
    }
}
