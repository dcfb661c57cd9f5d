use std::sync::Arc;

use peac_receipt_core::ReplayCache;

use crate::config::ConfHandle;

const REPLAY_CACHE_CAPACITY: usize = 100_000;
const REPLAY_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Clone)]
pub struct AppState {
    pub conf_handle: ConfHandle,
    pub replay_cache: Arc<ReplayCache>,
}

impl AppState {
    pub fn new(conf_handle: ConfHandle) -> Self {
        Self {
            conf_handle,
            replay_cache: Arc::new(ReplayCache::new(REPLAY_CACHE_CAPACITY, REPLAY_CACHE_TTL_SECS)),
        }
    }

    #[doc(hidden)]
    pub fn mock(json_config: &str) -> anyhow::Result<Self> {
        Ok(Self::new(ConfHandle::mock(json_config)?))
    }
}
