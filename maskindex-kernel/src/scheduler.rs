use crate::pipeline::MaskPipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{self, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Démarre le rafraîchissement périodique du classement.
/// Le premier cycle part immédiatement ; chaque tick lance son cycle dans une
/// task séparée et un tick qui tombe pendant un cycle en cours est sauté.
pub fn spawn_refresh_scheduler(pipeline: Arc<MaskPipeline>, every: Duration) -> JoinHandle<()> {
    task::spawn(async move {
        info!("[scheduler] refresh every {}s", every.as_secs());
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let pipeline = pipeline.clone();
            task::spawn(async move {
                if pipeline.try_run_cycle().await.is_none() {
                    warn!("[scheduler] previous cycle still running, tick skipped");
                }
            });
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CycleCache, MemoryCache};
    use crate::config::{FetchTrackConf, FetchTrackPaths};
    use crate::models::RankedEntry;
    use maskindex_devkit::{DetectionLineBuilder, FetchTrackFixture};

    #[tokio::test]
    async fn test_first_cycle_runs_immediately() {
        let fixture = FetchTrackFixture::new().unwrap();
        fixture
            .install_tool_emitting(&[("cam.jsonl", vec![DetectionLineBuilder::new(11).rec_mask(1).build()])])
            .unwrap();
        let cache = Arc::new(MemoryCache::new());
        let pipeline = Arc::new(MaskPipeline::new(
            &FetchTrackConf::default(),
            FetchTrackPaths::new(fixture.work_dir()),
            cache.clone(),
        ));

        let handle = spawn_refresh_scheduler(pipeline, Duration::from_secs(3600));

        let mut published = None;
        for _ in 0..50 {
            published = cache.latest_ranking().unwrap();
            if published.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        handle.abort();

        assert_eq!(published, Some(vec![RankedEntry { id: 11, value: 100 }]));
    }
}
