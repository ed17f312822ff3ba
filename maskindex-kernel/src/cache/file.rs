/**
 * CACHE FICHIER - Persistance JSON des slots de cycle
 *
 * Même principe que les ports JSON du kernel : le document est chargé en
 * mémoire à l'ouverture puis réécrit intégralement à chaque modification.
 * Permet au premier cycle après redémarrage de patcher la conf fetch_track
 * avec le timestamp du cycle précédent.
 *
 * FORMAT :
 * ```json
 * { "fetch_track_start_time": 1600747200, "center_mask": [{"id": 2, "value": 0}] }
 * ```
 */

use super::{CacheError, CycleCache, CycleState};
use crate::models::RankedEntry;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct FileCache {
    /// Chemin du document JSON
    storage_path: PathBuf,
    /// Copie en mémoire du document
    state: Mutex<CycleState>,
}

impl FileCache {
    /// Ouvre (ou crée) le document de cache
    pub fn open<P: AsRef<Path>>(storage_path: P) -> Result<Self, CacheError> {
        let path = storage_path.as_ref().to_path_buf();
        let cache = Self {
            storage_path: path.clone(),
            state: Mutex::new(CycleState::default()),
        };
        cache.load_from_disk()?;
        info!("[cache] file cache at {:?}", path);
        Ok(cache)
    }

    fn load_from_disk(&self) -> Result<(), CacheError> {
        if !self.storage_path.exists() {
            if let Some(parent) = self.storage_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(&self.storage_path, "{}")?;
        }

        let content = fs::read_to_string(&self.storage_path)?;
        let state: CycleState = if content.trim().is_empty() {
            CycleState::default()
        } else {
            serde_json::from_str(&content)?
        };

        *self.state.lock() = state;
        Ok(())
    }

    /// Le verrou reste tenu pendant l'écriture pour sérialiser les sauvegardes
    fn update<F: FnOnce(&mut CycleState)>(&self, mutate: F) -> Result<(), CacheError> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        mutate(&mut next);
        let json = serde_json::to_string_pretty(&next)?;
        fs::write(&self.storage_path, json)?;
        *state = next;
        Ok(())
    }
}

impl CycleCache for FileCache {
    fn last_fetch_start_time(&self) -> Result<Option<i64>, CacheError> {
        Ok(self.state.lock().last_fetch_start_time)
    }

    fn set_last_fetch_start_time(&self, timestamp: i64) -> Result<(), CacheError> {
        self.update(|s| s.last_fetch_start_time = Some(timestamp))
    }

    fn latest_ranking(&self) -> Result<Option<Vec<RankedEntry>>, CacheError> {
        Ok(self.state.lock().latest_ranking.clone())
    }

    fn set_latest_ranking(&self, entries: &[RankedEntry]) -> Result<(), CacheError> {
        self.update(|s| s.latest_ranking = Some(entries.to_vec()))
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
