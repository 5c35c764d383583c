use crate::IpcError;
use manis_ipc::conf::{Configuration, keys};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, oneshot};
use tokio::task::JoinSet;

#[derive(Debug)]
struct PoolState {
    ref_count: usize,
    accepting: bool,
}

#[derive(Debug)]
struct WorkerPoolInner {
    state: Mutex<PoolState>,
    tasks: AsyncMutex<JoinSet<()>>,
    shutdown_grace: Duration,
}

/// Task pool that performs request writes for every client sharing it.
///
/// The pool is reference counted explicitly: each [`crate::Client`] calls
/// [`WorkerPool::acquire`] on construction and [`WorkerPool::release`] when
/// it stops. The release that brings the count to zero waits up to the
/// shutdown grace for in-flight writes, then aborts what is left. A later
/// `acquire` reopens the pool.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    inner: Arc<WorkerPoolInner>,
}

impl WorkerPool {
    pub fn new(shutdown_grace: Duration) -> Self {
        Self {
            inner: Arc::new(WorkerPoolInner {
                state: Mutex::new(PoolState {
                    ref_count: 0,
                    accepting: false,
                }),
                tasks: AsyncMutex::new(JoinSet::new()),
                shutdown_grace,
            }),
        }
    }

    pub fn from_conf(conf: &Configuration) -> Self {
        Self::new(conf.get_duration_ms(
            keys::IPC_CLIENT_EXECUTOR_SHUTDOWN_GRACE_KEY,
            keys::IPC_CLIENT_EXECUTOR_SHUTDOWN_GRACE_DEFAULT,
        ))
    }

    pub fn acquire(&self) {
        let mut state = self.lock_state();
        state.ref_count += 1;
        state.accepting = true;
    }

    /// Drops one reference. The last one shuts the pool down.
    pub async fn release(&self) {
        {
            let mut state = self.lock_state();
            if state.ref_count == 0 {
                tracing::warn!("Worker pool released more times than acquired");
                return;
            }
            state.ref_count -= 1;
            if state.ref_count > 0 {
                return;
            }
            state.accepting = false;
        }

        let mut tasks = self.inner.tasks.lock().await;
        let drained = tokio::time::timeout(self.inner.shutdown_grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                "Worker pool did not drain within {:?}; aborting {} task(s)",
                self.inner.shutdown_grace,
                tasks.len()
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }

    pub fn ref_count(&self) -> usize {
        self.lock_state().ref_count
    }

    pub fn is_accepting(&self) -> bool {
        self.lock_state().accepting
    }

    /// Runs `task` on the pool and waits for its output.
    pub async fn submit<F, T>(&self, task: F) -> Result<T, IpcError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        {
            let mut tasks = self.inner.tasks.lock().await;
            if !self.is_accepting() {
                return Err(IpcError::ClientStopped);
            }
            // Reap finished tasks so the set does not grow without bound.
            while tasks.try_join_next().is_some() {}
            tasks.spawn(async move {
                let _ = tx.send(task.await);
            });
        }
        rx.await.map_err(|_| IpcError::Aborted)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(Duration::from_millis(
            keys::IPC_CLIENT_EXECUTOR_SHUTDOWN_GRACE_DEFAULT,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_runs_task() {
        let pool = WorkerPool::default();
        pool.acquire();
        assert_eq!(pool.submit(async { 7 }).await, Ok(7));
        pool.release().await;
    }

    #[tokio::test]
    async fn unacquired_pool_rejects_work() {
        let pool = WorkerPool::default();
        assert_eq!(pool.submit(async {}).await, Err(IpcError::ClientStopped));
    }

    #[tokio::test]
    async fn only_last_release_shuts_down() {
        let pool = WorkerPool::default();
        pool.acquire();
        pool.acquire();

        pool.release().await;
        assert_eq!(pool.ref_count(), 1);
        assert!(pool.is_accepting());

        pool.release().await;
        assert_eq!(pool.ref_count(), 0);
        assert!(!pool.is_accepting());
        assert!(pool.submit(async {}).await.is_err());

        pool.acquire();
        assert_eq!(pool.submit(async { "again" }).await, Ok("again"));
    }

    #[tokio::test]
    async fn shutdown_aborts_tasks_past_grace() {
        let pool = WorkerPool::new(Duration::from_millis(20));
        pool.acquire();

        let stuck = pool.clone();
        let pending = tokio::spawn(async move {
            stuck.submit(std::future::pending::<()>()).await
        });
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        pool.release().await;
        assert_eq!(pending.await.unwrap(), Err(IpcError::Aborted));
    }
}
