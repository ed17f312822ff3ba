/**
 * SCAN PEDESTRIAN_META - Cœur de calcul de l'indice masque
 *
 * RÔLE :
 * Lit tous les fichiers produits par fetch_track dans pedestrian_meta/,
 * agrège les visages par caméra, calcule le taux de port du masque et
 * retient les caméras au taux le plus faible.
 *
 * FONCTIONNEMENT :
 * - Une ligne = un visage détecté (JSON avec camera_id, rec_mask)
 * - Lignes invalides (JSON ou UTF-8) ignorées sans interrompre le fichier
 * - Erreur IO sur un fichier : reste du fichier abandonné, les autres continuent
 * - Tous les fichiers listés sont supprimés après lecture, quel que soit le résultat
 * - Classement croissant (pires caméras d'abord), stable sur égalité, top N
 */

use crate::models::{CameraAggregate, DetectionRecord, RankedEntry};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Résultat d'un passage du scanner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub entries: Vec<RankedEntry>,
    pub files_scanned: usize,
    pub files_failed: usize,
    pub records: u64,
    pub skipped_lines: u64,
}

/// Agrégats par caméra, dans l'ordre de première apparition
#[derive(Debug, Default)]
pub struct Aggregator {
    aggregates: Vec<CameraAggregate>,
    index: HashMap<i64, usize>,
    records: u64,
    skipped_lines: u64,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, record: DetectionRecord) {
        let slot = match self.index.get(&record.camera_id) {
            Some(&slot) => slot,
            None => {
                self.aggregates.push(CameraAggregate::new(record.camera_id));
                self.index.insert(record.camera_id, self.aggregates.len() - 1);
                self.aggregates.len() - 1
            }
        };
        self.aggregates[slot].record(record.mask_state);
        self.records += 1;
    }

    /// Retourne false si la ligne a été ignorée
    pub fn ingest_line(&mut self, line: &str) -> bool {
        match DetectionRecord::parse_line(line) {
            Some(record) => {
                self.ingest(record);
                true
            }
            None => {
                self.skipped_lines += 1;
                false
            }
        }
    }

    /// Ligne brute : un contenu non UTF-8 compte comme ligne invalide
    pub fn ingest_bytes(&mut self, raw: &[u8]) -> bool {
        match std::str::from_utf8(raw) {
            Ok(line) => self.ingest_line(line.trim_end_matches(&['\n', '\r'][..])),
            Err(_) => {
                self.skipped_lines += 1;
                false
            }
        }
    }

    #[cfg(test)]
    pub fn aggregates(&self) -> &[CameraAggregate] {
        &self.aggregates
    }

    /// Calcule les taux puis classe : croissant, stable, tronqué à `top_n`
    pub fn finish(mut self, top_n: usize) -> (Vec<CameraAggregate>, Vec<RankedEntry>) {
        for aggregate in &mut self.aggregates {
            aggregate.compute_ratio();
        }
        let ranking = rank(&self.aggregates, top_n);
        (self.aggregates, ranking)
    }
}

pub fn rank(aggregates: &[CameraAggregate], top_n: usize) -> Vec<RankedEntry> {
    let mut sorted: Vec<&CameraAggregate> = aggregates.iter().filter(|a| a.total_faces > 0).collect();
    sorted.sort_by_key(|a| a.mask_ratio);
    sorted.into_iter().take(top_n).map(RankedEntry::from).collect()
}

/// Fichiers directs du répertoire, triés par nom. Répertoire absent = liste vide.
pub async fn list_meta_files(dir: &Path) -> Vec<PathBuf> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("[scanner] cannot list {:?}: {e}", dir);
            return Vec::new();
        }
    };

    let mut files = Vec::new();
    loop {
        match entries.next_entry().await {
            // metadata suit les liens symboliques
            Ok(Some(entry)) => match fs::metadata(entry.path()).await {
                Ok(meta) if meta.is_file() => files.push(entry.path()),
                Ok(_) => {}
                Err(e) => debug!("[scanner] skipping unreadable entry {:?}: {e}", entry.path()),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("[scanner] listing {:?} interrupted: {e}", dir);
                break;
            }
        }
    }
    files.sort();
    files
}

/// Supprime les fichiers listés ; retourne le nombre supprimé
pub async fn remove_files(files: &[PathBuf]) -> usize {
    let mut removed = 0;
    for file in files {
        match fs::remove_file(file).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("[scanner] failed to delete {:?}: {e}", file),
        }
    }
    removed
}

/// Vide pedestrian_meta/ (appelé avant le lancement de fetch_track)
pub async fn clear_meta_dir(dir: &Path) -> usize {
    let files = list_meta_files(dir).await;
    let removed = remove_files(&files).await;
    if removed > 0 {
        info!("[scanner] cleared {removed} leftover file(s) from {:?}", dir);
    }
    removed
}

async fn ingest_file(path: &Path, aggregator: &mut Aggregator) -> Result<(), ScanError> {
    let io_err = |source: std::io::Error| ScanError::Io { path: path.to_path_buf(), source };
    let file = fs::File::open(path).await.map_err(io_err)?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await.map_err(io_err)? == 0 {
            return Ok(());
        }
        aggregator.ingest_bytes(&buf);
    }
}

/// Lit, agrège, classe puis vide le répertoire
pub async fn scan_meta_dir(dir: &Path, top_n: usize) -> ScanReport {
    let files = list_meta_files(dir).await;
    let mut aggregator = Aggregator::new();
    let mut files_failed = 0;

    for file in &files {
        if let Err(e) = ingest_file(file, &mut aggregator).await {
            warn!("[scanner] {e}");
            files_failed += 1;
        }
    }

    remove_files(&files).await;

    let records = aggregator.records;
    let skipped_lines = aggregator.skipped_lines;
    if skipped_lines > 0 {
        debug!("[scanner] skipped {skipped_lines} malformed line(s)");
    }
    let (aggregates, entries) = aggregator.finish(top_n);
    info!(
        "[scanner] {} file(s), {} record(s), {} camera(s) -> {} ranked",
        files.len(),
        records,
        aggregates.len(),
        entries.len()
    );

    ScanReport { entries, files_scanned: files.len(), files_failed, records, skipped_lines }
}
