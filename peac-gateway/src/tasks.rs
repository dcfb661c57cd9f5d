//! Background maintenance tasks, spawned once at startup alongside the
//! HTTP server and torn down together with it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use peac_receipt_core::ReplayCache;
use peac_task::{ShutdownSignal, Task};
use tokio::time::interval;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically evicts expired `rid`s from the replay cache so it does not
/// grow unbounded between receipts that never reappear.
pub struct ReplaySweepTask {
    cache: Arc<ReplayCache>,
}

impl ReplaySweepTask {
    pub fn new(cache: Arc<ReplayCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl Task for ReplaySweepTask {
    type Output = ();

    const NAME: &'static str = "replay-cache-sweep";

    async fn run(self, mut shutdown_signal: ShutdownSignal) {
        let mut ticker = interval(SWEEP_INTERVAL);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = time::OffsetDateTime::now_utc().unix_timestamp().max(0) as u64;
                    self.cache.sweep(now);
                    trace!(len = self.cache.len(), "swept replay cache");
                }
                _ = shutdown_signal.wait() => break,
            }
        }
    }
}
