use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

pub const DEFAULT_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_TOP_N: usize = 4;
pub const DEFAULT_LAUNCHER: &str = "sh {script}";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct KernelConfig {
    pub fetch_track: FetchTrackConf,
    pub cache: CacheConf,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct FetchTrackConf {
    /// Répertoire de l'outil fetch_track ; vide = `<cwd>/fetch_track`
    pub file_path: String,
    pub interval_secs: u64,
    pub launcher: String, // ex: "sh {script}" ou "bash -e {script}"
    pub top_n: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    File,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConf {
    pub backend: CacheBackend,
    pub path: PathBuf,
}

impl Default for FetchTrackConf {
    fn default() -> Self {
        Self {
            file_path: String::new(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            launcher: DEFAULT_LAUNCHER.into(),
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl Default for CacheConf {
    fn default() -> Self {
        Self { backend: CacheBackend::File, path: PathBuf::from("./data/cache.json") }
    }
}

/// Chemins dérivés du répertoire de travail, résolus une seule fois au démarrage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTrackPaths {
    pub work_dir: PathBuf,
    pub conf_file: PathBuf,
    pub script: PathBuf,
    pub meta_dir: PathBuf,
}

impl FetchTrackPaths {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        Self {
            conf_file: work_dir.join("fetch_track_tool").join("fetch_track_meta.conf"),
            script: work_dir.join("run_fetch_track.sh"),
            meta_dir: work_dir.join("pedestrian_meta"),
            work_dir,
        }
    }
}

/// Répertoire configuré, ou `<cwd>/fetch_track` si vide
pub fn resolve_work_dir(configured: &str, cwd: &Path) -> PathBuf {
    if configured.trim().is_empty() {
        cwd.join("fetch_track")
    } else {
        PathBuf::from(configured)
    }
}

impl KernelConfig {
    pub fn paths(&self) -> FetchTrackPaths {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        FetchTrackPaths::new(resolve_work_dir(&self.fetch_track.file_path, &cwd))
    }

    /// Surcharges par variables d'environnement (après lecture du YAML)
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("FETCH_TRACK_FILE_PATH") {
            self.fetch_track.file_path = path;
        }
        if let Some(raw) = lookup("FETCH_TRACK_INTERVAL_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(secs) => self.fetch_track.interval_secs = secs,
                Err(e) => warn!("[config] FETCH_TRACK_INTERVAL_SECS invalide ({raw}): {e}"),
            }
        }
        if let Some(path) = lookup("MASKINDEX_CACHE_PATH") {
            self.cache.path = PathBuf::from(path);
        }
    }

    fn sanitize(&mut self) {
        if self.fetch_track.interval_secs == 0 {
            warn!("[config] interval_secs=0 refusé, usage de {DEFAULT_INTERVAL_SECS}s");
            self.fetch_track.interval_secs = DEFAULT_INTERVAL_SECS;
        }
        if self.fetch_track.top_n == 0 {
            warn!("[config] top_n=0 refusé, usage de {DEFAULT_TOP_N}");
            self.fetch_track.top_n = DEFAULT_TOP_N;
        }
        if self.fetch_track.launcher.trim().is_empty() {
            self.fetch_track.launcher = DEFAULT_LAUNCHER.into();
        }
    }
}

fn parse_config(txt: &str) -> KernelConfig {
    if txt.trim().is_empty() {
        return KernelConfig::default();
    }
    serde_yaml::from_str(txt).unwrap_or_else(|e| {
        warn!("[config] config invalide: {e}");
        KernelConfig::default()
    })
}

pub async fn load_config() -> KernelConfig {
    let path = std::env::var("MASKINDEX_KERNEL_CONFIG").unwrap_or_else(|_| "kernel.yaml".into());
    let mut cfg = if Path::new(&path).exists() {
        let txt = fs::read_to_string(&path).await.unwrap_or_default();
        info!("[config] loaded {path}");
        parse_config(&txt)
    } else {
        info!("[config] pas de {path}, usage config par défaut");
        KernelConfig::default()
    };
    cfg.apply_env(|key| std::env::var(key).ok());
    cfg.sanitize();
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_resolve_work_dir_default() {
        let cwd = Path::new("/srv/app");
        assert_eq!(resolve_work_dir("", cwd), PathBuf::from("/srv/app/fetch_track"));
        assert_eq!(resolve_work_dir("   ", cwd), PathBuf::from("/srv/app/fetch_track"));
    }

    #[test]
    fn test_resolve_work_dir_configured() {
        let cwd = Path::new("/srv/app");
        assert_eq!(resolve_work_dir("/opt/fetch", cwd), PathBuf::from("/opt/fetch"));
    }

    #[test]
    fn test_paths_layout() {
        let paths = FetchTrackPaths::new("/opt/fetch");
        assert_eq!(paths.conf_file, PathBuf::from("/opt/fetch/fetch_track_tool/fetch_track_meta.conf"));
        assert_eq!(paths.script, PathBuf::from("/opt/fetch/run_fetch_track.sh"));
        assert_eq!(paths.meta_dir, PathBuf::from("/opt/fetch/pedestrian_meta"));
    }

    #[test]
    fn test_parse_partial_yaml() {
        let cfg = parse_config("fetch_track:\n  file_path: /data/ft\n  interval_secs: 60\ncache:\n  backend: memory\n");
        assert_eq!(cfg.fetch_track.file_path, "/data/ft");
        assert_eq!(cfg.fetch_track.interval_secs, 60);
        assert_eq!(cfg.fetch_track.top_n, DEFAULT_TOP_N);
        assert_eq!(cfg.cache.backend, CacheBackend::Memory);
    }

    #[test]
    fn test_parse_invalid_yaml_falls_back() {
        let cfg = parse_config("fetch_track: [oops");
        assert_eq!(cfg.fetch_track.interval_secs, DEFAULT_INTERVAL_SECS);
        assert_eq!(cfg.cache.backend, CacheBackend::File);
    }

    #[test]
    fn test_env_overrides_and_sanitize() {
        let env: HashMap<&str, &str> = [
            ("FETCH_TRACK_FILE_PATH", "/env/ft"),
            ("FETCH_TRACK_INTERVAL_SECS", "0"),
            ("MASKINDEX_CACHE_PATH", "/tmp/c.json"),
        ]
        .into_iter()
        .collect();
        let mut cfg = KernelConfig::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));
        cfg.sanitize();
        assert_eq!(cfg.fetch_track.file_path, "/env/ft");
        assert_eq!(cfg.fetch_track.interval_secs, DEFAULT_INTERVAL_SECS);
        assert_eq!(cfg.cache.path, PathBuf::from("/tmp/c.json"));
    }
}
