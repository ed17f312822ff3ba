/**
 * CACHE CYCLE - Slots typés partagés entre cycles et lecteurs
 *
 * RÔLE :
 * Ce module définit l'interface du cache clé/valeur externe, réduite aux deux
 * slots dont le pipeline a besoin :
 * - `fetch_track_start_time` : timestamp Unix (s) du début du dernier cycle
 * - `center_mask` : dernier classement publié (≤ 4 entrées, ordre de rang)
 *
 * FONCTIONNEMENT :
 * - CycleCache trait = get/set typés, implémenté par chaque backend
 * - MemoryCache = slots en mémoire (tests, déploiement sans persistance)
 * - FileCache = document JSON rechargé au démarrage, réécrit à chaque set
 * - CachePublisher = règles de publication (jamais de classement vide)
 */

pub mod file;
pub mod memory;

use crate::config::{CacheBackend, CacheConf};
use crate::models::RankedEntry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub use file::FileCache;
pub use memory::MemoryCache;

pub const START_TIME_KEY: &str = "fetch_track_start_time";
pub const RANKING_KEY: &str = "center_mask";

/// Erreurs possibles lors des accès au cache
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Contenu complet du cache, tel que persisté par FileCache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleState {
    #[serde(rename = "fetch_track_start_time", default, skip_serializing_if = "Option::is_none")]
    pub last_fetch_start_time: Option<i64>,
    #[serde(rename = "center_mask", default, skip_serializing_if = "Option::is_none")]
    pub latest_ranking: Option<Vec<RankedEntry>>,
}

/// Interface commune des backends de cache
pub trait CycleCache: Send + Sync {
    fn last_fetch_start_time(&self) -> Result<Option<i64>, CacheError>;

    fn set_last_fetch_start_time(&self, timestamp: i64) -> Result<(), CacheError>;

    fn latest_ranking(&self) -> Result<Option<Vec<RankedEntry>>, CacheError>;

    fn set_latest_ranking(&self, entries: &[RankedEntry]) -> Result<(), CacheError>;

    /// Nom du backend pour les logs
    fn name(&self) -> &'static str;
}

/// Construit le backend configuré
pub fn create_cache(conf: &CacheConf) -> Result<Arc<dyn CycleCache>, CacheError> {
    let cache: Arc<dyn CycleCache> = match conf.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::File => Arc::new(FileCache::open(&conf.path)?),
    };
    info!("[cache] using {} backend", cache.name());
    Ok(cache)
}

/// Règles d'écriture du cycle au-dessus d'un backend
#[derive(Clone)]
pub struct CachePublisher {
    cache: Arc<dyn CycleCache>,
}

impl CachePublisher {
    pub fn new(cache: Arc<dyn CycleCache>) -> Self {
        Self { cache }
    }

    pub fn last_fetch_start_time(&self) -> Result<Option<i64>, CacheError> {
        self.cache.last_fetch_start_time()
    }

    /// Écrase toujours le timestamp de début de cycle
    pub fn record_cycle_start(&self, timestamp: i64) -> Result<(), CacheError> {
        self.cache.set_last_fetch_start_time(timestamp)?;
        debug!("[cache] {START_TIME_KEY} = {timestamp}");
        Ok(())
    }

    /// Publie le classement s'il n'est pas vide. Retourne true si écrit.
    pub fn publish_ranking(&self, entries: &[RankedEntry]) -> Result<bool, CacheError> {
        if entries.is_empty() {
            debug!("[cache] empty ranking, keeping previous {RANKING_KEY}");
            return Ok(false);
        }
        self.cache.set_latest_ranking(entries)?;
        info!("[cache] published {} entries to {RANKING_KEY}", entries.len());
        Ok(true)
    }

    pub fn latest_ranking(&self) -> Result<Option<Vec<RankedEntry>>, CacheError> {
        self.cache.latest_ranking()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> CachePublisher {
        CachePublisher::new(Arc::new(MemoryCache::new()))
    }

    #[test]
    fn test_record_cycle_start_overwrites() {
        let p = publisher();
        assert_eq!(p.last_fetch_start_time().unwrap(), None);
        p.record_cycle_start(100).unwrap();
        p.record_cycle_start(200).unwrap();
        assert_eq!(p.last_fetch_start_time().unwrap(), Some(200));
    }

    #[test]
    fn test_empty_ranking_is_never_published() {
        let p = publisher();
        assert!(!p.publish_ranking(&[]).unwrap());
        assert_eq!(p.latest_ranking().unwrap(), None);

        let first = vec![RankedEntry { id: 3, value: 40 }];
        assert!(p.publish_ranking(&first).unwrap());
        assert!(!p.publish_ranking(&[]).unwrap());
        assert_eq!(p.latest_ranking().unwrap(), Some(first));
    }

    #[test]
    fn test_cycle_state_json_keys() {
        let state = CycleState {
            last_fetch_start_time: Some(456),
            latest_ranking: Some(vec![RankedEntry { id: 2, value: 0 }]),
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["fetch_track_start_time"], 456);
        assert_eq!(json["center_mask"][0]["id"], 2);
        assert_eq!(json["center_mask"][0]["value"], 0);
    }
}
