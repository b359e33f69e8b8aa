// Bounded pool for target fetches.
//
// Up to `worker_count` fetches run at once; results come back in config order
// so the single writer that applies them sees the same discovery order as a
// sequential pass.

use futures::stream::{self, StreamExt};

use crate::engine::config::{GameConfig, Target};
use crate::engine::poller::TargetPoller;
use crate::error::TargetError;
use crate::metrics;

/// Result of fetching one target.
pub type FetchResult = Result<Vec<u8>, TargetError>;

#[derive(Debug, Clone)]
pub struct WorkerPool {
    worker_count: usize,
}

impl WorkerPool {
    /// A pool of `worker_count` concurrent fetches. Zero is treated as one.
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Fetch every configured target, returning `(target, result)` pairs in
    /// the order of `config.targets`.
    pub async fn fetch_all<'a>(
        &self,
        poller: &TargetPoller,
        config: &'a GameConfig,
    ) -> Vec<(&'a Target, FetchResult)> {
        let fetches: Vec<_> = config
            .targets
            .iter()
            .map(|target| async move {
                tracing::info!(server = %target.name, url = %target.url, "checking server");
                metrics::POLLS_IN_FLIGHT.inc();
                let result = poller.fetch(target, config.timeout_for(target)).await;
                metrics::POLLS_IN_FLIGHT.dec();
                (target, result)
            })
            .collect();
        stream::iter(fetches)
            .buffered(self.worker_count)
            .collect::<Vec<_>>()
            .await
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(1)
    }
}
