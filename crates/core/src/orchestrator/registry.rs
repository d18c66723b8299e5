//! Active-job registry and admission gate.
//!
//! The registry is the single owner of all in-flight job state. Admission is
//! atomic: the capacity check and the insert happen under one lock, so the
//! ceiling can never be exceeded by concurrent submissions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use super::ActiveJob;

/// Called with `(current, ceiling)` after every admission and release.
pub type ActiveJobsObserver = Arc<dyn Fn(usize, usize) + Send + Sync>;

pub struct ActiveJobRegistry {
    ceiling: usize,
    inner: Mutex<HashMap<i64, Arc<AsyncMutex<ActiveJob>>>>,
    observers: Mutex<Vec<ActiveJobsObserver>>,
}

impl ActiveJobRegistry {
    pub fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            inner: Mutex::new(HashMap::new()),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Cheap pre-check; only `admit` is authoritative.
    pub fn has_capacity(&self) -> bool {
        self.count() < self.ceiling
    }

    /// Admit a job if there is capacity. Returns the shared handle on
    /// success, `None` when the ceiling is reached.
    pub fn admit(&self, active: ActiveJob) -> Option<Arc<AsyncMutex<ActiveJob>>> {
        let (handle, count) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.len() >= self.ceiling {
                return None;
            }
            let job_id = active.job.id;
            let handle = Arc::new(AsyncMutex::new(active));
            inner.insert(job_id, Arc::clone(&handle));
            (handle, inner.len())
        };
        self.notify_observers(count);
        Some(handle)
    }

    /// Remove a job from the registry, freeing its slot.
    pub fn release(&self, job_id: i64) {
        let count = {
            let mut inner = self.inner.lock().unwrap();
            inner.remove(&job_id);
            inner.len()
        };
        self.notify_observers(count);
    }

    pub fn get(&self, job_id: i64) -> Option<Arc<AsyncMutex<ActiveJob>>> {
        self.inner.lock().unwrap().get(&job_id).map(Arc::clone)
    }

    /// Find the active job that dispatched the given correlation id.
    ///
    /// Linear scan over all active jobs; the map lock is released before the
    /// per-job locks are taken, so a job holding its own lock while
    /// dispatching cannot deadlock the scan.
    pub async fn resolve(&self, correlation_id: Uuid) -> Option<Arc<AsyncMutex<ActiveJob>>> {
        let handles: Vec<_> = {
            let inner = self.inner.lock().unwrap();
            inner.values().map(Arc::clone).collect()
        };

        for handle in handles {
            let guard = handle.lock().await;
            if guard.active_script_ids.contains(&correlation_id) {
                drop(guard);
                return Some(handle);
            }
        }
        None
    }

    /// Register an observer; it is immediately called with the current state.
    pub fn add_observer(&self, observer: ActiveJobsObserver) {
        observer(self.count(), self.ceiling);
        self.observers.lock().unwrap().push(observer);
    }

    fn notify_observers(&self, count: usize) {
        let observers = self.observers.lock().unwrap();
        for observer in observers.iter() {
            observer(count, self.ceiling);
        }
    }
}
