/**
 * PATCH CONF FETCH_TRACK - Fenêtre de détection glissante
 *
 * RÔLE :
 * Avant chaque exécution, la ligne `start_time` de fetch_track_meta.conf est
 * réécrite avec le timestamp du début du cycle précédent. fetch_track ne
 * renvoie ainsi que les détections émises depuis ce moment.
 *
 * Un échec n'est jamais bloquant : l'outil reprend simplement l'ancien
 * start_time (fenêtre plus large, résultat toujours correct).
 */

use crate::cache::{CacheError, CachePublisher};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info};

const START_TIME_TOKEN: &str = "start_time";

#[cfg(windows)]
const LINE_ENDING: &str = "\r\n";
#[cfg(not(windows))]
const LINE_ENDING: &str = "\n";

#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Pas encore de timestamp en cache (premier cycle)
    Skipped,
    /// Fichier réécrit, `lines` lignes start_time modifiées
    Patched { lines: usize },
    Failed(String),
}

/// Réécrit une ligne `clé:valeur` en `clé:<timestamp>,`
fn patch_line(line: &str, timestamp: i64) -> Option<String> {
    if !line.contains(START_TIME_TOKEN) {
        return None;
    }
    let colon = line.find(':')?;
    Some(format!("{}{},", &line[..=colon], timestamp))
}

/// Réécrit le contenu complet ; chaque ligne est suivie du terminateur plateforme
pub fn patch_content(content: &str, timestamp: i64) -> (String, usize) {
    let mut buf = String::with_capacity(content.len() + 16);
    let mut patched = 0;
    for line in content.lines() {
        match patch_line(line, timestamp) {
            Some(replaced) => {
                buf.push_str(&replaced);
                patched += 1;
            }
            None => buf.push_str(line),
        }
        buf.push_str(LINE_ENDING);
    }
    (buf, patched)
}

pub async fn patch_conf_file(path: &Path, timestamp: i64) -> Result<usize, PatchError> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Err(PatchError::NotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).await?;
    let (patched_content, patched) = patch_content(&content, timestamp);
    fs::write(path, patched_content).await?;
    Ok(patched)
}

async fn patch_from_cache(
    publisher: &CachePublisher,
    conf_file: &Path,
) -> Result<Option<(i64, usize)>, PatchError> {
    let Some(start_time) = publisher.last_fetch_start_time()? else {
        return Ok(None);
    };
    let lines = patch_conf_file(conf_file, start_time).await?;
    Ok(Some((start_time, lines)))
}

/// Étape de cycle : lit le timestamp précédent en cache et patche la conf
pub async fn patch_before_cycle(publisher: &CachePublisher, conf_file: &Path) -> PatchOutcome {
    match patch_from_cache(publisher, conf_file).await {
        Ok(None) => {
            debug!("[conf] no previous start time cached, conf left untouched");
            PatchOutcome::Skipped
        }
        Ok(Some((start_time, lines))) => {
            info!("[conf] start_time -> {start_time} ({lines} line(s) in {:?})", conf_file);
            PatchOutcome::Patched { lines }
        }
        Err(e) => {
            error!("[conf] patch failed, fetch_track keeps its previous window: {e}");
            PatchOutcome::Failed(e.to_string())
        }
    }
}
