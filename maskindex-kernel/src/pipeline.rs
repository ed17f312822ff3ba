/**
 * PIPELINE MASQUE - Orchestration d'un cycle fetch_track complet
 *
 * RÔLE :
 * Enchaîne les étapes d'un cycle et expose la lecture du classement.
 *
 * CYCLE :
 * 1. patch de fetch_track_meta.conf (start_time = début du cycle précédent)
 * 2. enregistrement du début de ce cycle en cache
 * 3. purge de pedestrian_meta/ (restes d'un cycle interrompu)
 * 4. exécution de run_fetch_track.sh (bloquant jusqu'à la fin)
 * 5. scan + agrégation + purge de pedestrian_meta/
 * 6. publication du classement s'il n'est pas vide
 *
 * CONCURRENCE :
 * Un seul cycle à la fois touche pedestrian_meta/ et la conf. Le scheduler
 * saute un tick si un cycle tourne déjà ; la lecture avec repli attend.
 */

use crate::cache::{CachePublisher, CycleCache};
use crate::conf_patch::{patch_before_cycle, PatchOutcome};
use crate::config::{FetchTrackConf, FetchTrackPaths};
use crate::models::RankedEntry;
use crate::runner::{run_fetch_track, RunOutcome};
use crate::scanner::{clear_meta_dir, scan_meta_dir, ScanReport};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Bilan d'un cycle, pour les logs et la sous-commande run-once
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: i64,
    pub patch: PatchOutcome,
    pub run: RunOutcome,
    pub scan: ScanReport,
    pub published: bool,
    pub elapsed: Duration,
}

pub struct MaskPipeline {
    paths: FetchTrackPaths,
    launcher: String,
    top_n: usize,
    publisher: CachePublisher,
    /// Tenu pendant toute opération qui modifie pedestrian_meta/ ou la conf
    cycle_guard: Mutex<()>,
}

/// Timestamp Unix (s) du début de cycle.
///
/// Epoch réel (UTC), pas l'heure locale interprétée comme UTC+8. Les deux
/// conventions ne coïncident que sur un hôte réglé en UTC+8 ; ailleurs, le
/// start_time écrit dans la conf en diffère du décalage horaire de l'hôte.
pub fn cycle_timestamp() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

impl MaskPipeline {
    pub fn new(conf: &FetchTrackConf, paths: FetchTrackPaths, cache: Arc<dyn CycleCache>) -> Self {
        Self {
            paths,
            launcher: conf.launcher.clone(),
            top_n: conf.top_n,
            publisher: CachePublisher::new(cache),
            cycle_guard: Mutex::new(()),
        }
    }

    /// Cycle du scheduler : `None` si un autre cycle tient déjà le verrou
    pub async fn try_run_cycle(&self) -> Option<CycleReport> {
        let _guard = self.cycle_guard.try_lock().ok()?;
        Some(self.run_cycle_locked().await)
    }

    /// Cycle complet, en attendant la fin d'un éventuel cycle en cours
    pub async fn run_cycle(&self) -> CycleReport {
        let _guard = self.cycle_guard.lock().await;
        self.run_cycle_locked().await
    }

    async fn run_cycle_locked(&self) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("cycle", id = %cycle_id);
        async move {
            let started = Instant::now();
            info!("[pipeline] cycle starting");

            let patch = patch_before_cycle(&self.publisher, &self.paths.conf_file).await;

            let started_at = cycle_timestamp();
            if let Err(e) = self.publisher.record_cycle_start(started_at) {
                error!("[pipeline] failed to record cycle start: {e}");
            }

            clear_meta_dir(&self.paths.meta_dir).await;

            let run = run_fetch_track(&self.launcher, &self.paths.script, &self.paths.work_dir).await;

            let (scan, published) = self.scan_and_publish_locked().await;

            let report = CycleReport {
                cycle_id,
                started_at,
                patch,
                run,
                scan,
                published,
                elapsed: started.elapsed(),
            };
            info!(
                "[pipeline] cycle done in {:.1}s ({} ranked, published: {})",
                report.elapsed.as_secs_f32(),
                report.scan.entries.len(),
                report.published
            );
            report
        }
        .instrument(span)
        .await
    }

    async fn scan_and_publish_locked(&self) -> (ScanReport, bool) {
        let scan = scan_meta_dir(&self.paths.meta_dir, self.top_n).await;
        let published = match self.publisher.publish_ranking(&scan.entries) {
            Ok(published) => published,
            Err(e) => {
                error!("[pipeline] failed to publish ranking: {e}");
                false
            }
        };
        (scan, published)
    }

    fn cached_ranking(&self) -> Option<Vec<RankedEntry>> {
        match self.publisher.latest_ranking() {
            Ok(Some(entries)) if !entries.is_empty() => Some(entries),
            Ok(_) => None,
            Err(e) => {
                warn!("[pipeline] cache read failed, treating as miss: {e}");
                None
            }
        }
    }

    /// Lecture du classement : cache, sinon scan local, sinon cycle synchrone.
    /// Peut retourner une liste vide, jamais d'erreur.
    pub async fn get_center_mask_data(&self) -> Vec<RankedEntry> {
        if let Some(entries) = self.cached_ranking() {
            return entries;
        }

        let _guard = self.cycle_guard.lock().await;

        // un cycle a pu publier pendant l'attente du verrou
        if let Some(entries) = self.cached_ranking() {
            return entries;
        }

        let (scan, _) = self.scan_and_publish_locked().await;
        if !scan.entries.is_empty() {
            return scan.entries;
        }

        info!("[pipeline] no ranking available, running a synchronous cycle");
        let report = self.run_cycle_locked().await;
        if !report.scan.entries.is_empty() {
            return report.scan.entries;
        }

        self.scan_and_publish_locked().await.0.entries
    }
}
