//! Lancement de run_fetch_track.sh
//!
//! Le script est lancé sans arguments via le lanceur configuré
//! (`sh {script}` par défaut) et attendu jusqu'à sa fin, sans timeout.
//! Le code de sortie est journalisé mais n'influence pas le cycle.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { exit_code: Option<i32>, elapsed: Duration },
    SpawnFailed(String),
}

/// Découpe le lanceur en argv et substitue `{script}`
pub fn build_argv(launcher: &str, script: &Path) -> Result<Vec<String>, String> {
    let words = shell_words::split(launcher).map_err(|e| format!("invalid launcher '{launcher}': {e}"))?;
    if words.is_empty() {
        return Err("empty launcher".to_string());
    }
    let script = script.to_string_lossy();
    Ok(words.into_iter().map(|w| w.replace("{script}", &script)).collect())
}

/// Exécute fetch_track et attend sa terminaison. Ne retourne jamais d'erreur.
pub async fn run_fetch_track(launcher: &str, script: &Path, work_dir: &Path) -> RunOutcome {
    let argv = match build_argv(launcher, script) {
        Ok(argv) => argv,
        Err(e) => {
            error!("[runner] {e}");
            return RunOutcome::SpawnFailed(e);
        }
    };

    let mut cmd = Command::new(&argv[0]);
    cmd.args(&argv[1..])
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // un cycle abandonné (arrêt du service) ne laisse pas l'outil orphelin
        .kill_on_drop(true);

    debug!("[runner] exec {:?} in {:?}", argv, work_dir);
    let started = Instant::now();
    match cmd.output().await {
        Ok(output) => {
            let elapsed = started.elapsed();
            if output.status.success() {
                info!("[runner] fetch_track finished in {:.1}s", elapsed.as_secs_f32());
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    "[runner] fetch_track exited with {} after {:.1}s: {}",
                    output.status,
                    elapsed.as_secs_f32(),
                    stderr.trim()
                );
            }
            RunOutcome::Completed { exit_code: output.status.code(), elapsed }
        }
        Err(e) => {
            error!("[runner] failed to start {:?}: {e}", argv);
            RunOutcome::SpawnFailed(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_argv_default_launcher() {
        let argv = build_argv("sh {script}", Path::new("/opt/ft/run_fetch_track.sh")).unwrap();
        assert_eq!(argv, vec!["sh", "/opt/ft/run_fetch_track.sh"]);
    }

    #[test]
    fn test_build_argv_quoted() {
        let argv = build_argv("bash -c 'exec \"$0\"' {script}", Path::new("/a b/run.sh")).unwrap();
        assert_eq!(argv, vec!["bash", "-c", "exec \"$0\"", "/a b/run.sh"]);
    }

    #[test]
    fn test_build_argv_rejects_empty() {
        assert!(build_argv("   ", Path::new("x")).is_err());
        assert!(build_argv("sh 'unterminated", Path::new("x")).is_err());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_absorbed() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_fetch_track(
            "/nonexistent/launcher-binary {script}",
            &dir.path().join("run_fetch_track.sh"),
            dir.path(),
        )
        .await;
        assert!(matches!(outcome, RunOutcome::SpawnFailed(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_waits_for_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("run_fetch_track.sh");
        std::fs::write(&script, "sleep 0.2\necho done > marker.txt\nexit 3\n").unwrap();

        let outcome = run_fetch_track("sh {script}", &script, dir.path()).await;
        assert!(matches!(outcome, RunOutcome::Completed { exit_code: Some(3), .. }));
        assert!(dir.path().join("marker.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropped_run_kills_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("run_fetch_track.sh");
        std::fs::write(&script, "sleep 1\necho late > marker.txt\n").unwrap();

        let run = run_fetch_track("sh {script}", &script, dir.path());
        assert!(tokio::time::timeout(Duration::from_millis(200), run).await.is_err());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!dir.path().join("marker.txt").exists());
    }
}
