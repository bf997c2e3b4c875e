//! Fire-and-forget work spawned by request handlers.
//!
//! Handlers answer the display first and refresh or precache afterwards. The
//! handles are kept so shutdown can abort stragglers and tests can wait for
//! quiescence.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::Instrument;

#[derive(Debug, Clone, Default)]
pub struct BackgroundTasks {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn spawn<F>(&self, label: &'static str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let span = tracing::debug_span!("background", task = label);
        let handle = tokio::spawn(future.instrument(span));
        let mut handles = self.lock();
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
    }

    /// Number of tasks not yet finished.
    pub fn pending(&self) -> usize {
        self.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait until every task, including ones spawned meanwhile, has finished.
    pub async fn wait_idle(&self) {
        loop {
            let drained: Vec<JoinHandle<()>> = std::mem::take(&mut *self.lock());
            if drained.is_empty() {
                return;
            }
            for handle in drained {
                if let Err(e) = handle.await {
                    if e.is_panic() {
                        tracing::error!(error = %e, "Background task panicked");
                    }
                }
            }
        }
    }

    pub fn abort_all(&self) {
        for handle in self.lock().drain(..) {
            handle.abort();
        }
    }
}
