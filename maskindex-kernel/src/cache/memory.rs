use super::{CacheError, CycleCache, CycleState};
use crate::models::RankedEntry;
use parking_lot::Mutex;

/// Slots en mémoire, perdus au redémarrage
#[derive(Default)]
pub struct MemoryCache {
    state: Mutex<CycleState>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CycleCache for MemoryCache {
    fn last_fetch_start_time(&self) -> Result<Option<i64>, CacheError> {
        Ok(self.state.lock().last_fetch_start_time)
    }

    fn set_last_fetch_start_time(&self, timestamp: i64) -> Result<(), CacheError> {
        self.state.lock().last_fetch_start_time = Some(timestamp);
        Ok(())
    }

    fn latest_ranking(&self) -> Result<Option<Vec<RankedEntry>>, CacheError> {
        Ok(self.state.lock().latest_ranking.clone())
    }

    fn set_latest_ranking(&self, entries: &[RankedEntry]) -> Result<(), CacheError> {
        self.state.lock().latest_ranking = Some(entries.to_vec());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
