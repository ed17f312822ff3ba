/*!
Répertoire fetch_track jetable pour les tests

Reproduit l'arborescence attendue par le kernel:

```text
<work_dir>/
  fetch_track_tool/fetch_track_meta.conf
  pedestrian_meta/
  run_fetch_track.sh
```

Le faux `run_fetch_track.sh` copie des fichiers préparés à l'avance dans
pedestrian_meta/, comme le ferait le vrai outil.
*/

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const DEFAULT_CONF: &str = "camera_ids:1,2,3,\nstart_time:123,\nend_time:0,\n";

pub struct FetchTrackFixture {
    dir: TempDir,
}

impl FetchTrackFixture {
    /// Crée l'arborescence avec une conf par défaut et un pedestrian_meta/ vide
    pub fn new() -> Result<Self> {
        env_logger::try_init().ok(); // Init logging pour tests

        let dir = tempfile::tempdir().context("failed to create temp work dir")?;
        let fixture = Self { dir };
        fs::create_dir_all(fixture.conf_path().parent().unwrap_or(fixture.dir.path()))?;
        fs::create_dir_all(fixture.meta_dir())?;
        fs::create_dir_all(fixture.staging_dir())?;
        fs::write(fixture.conf_path(), DEFAULT_CONF)?;
        log::debug!("fetch_track fixture at {}", fixture.work_dir().display());
        Ok(fixture)
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn conf_path(&self) -> PathBuf {
        self.dir.path().join("fetch_track_tool").join("fetch_track_meta.conf")
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.dir.path().join("pedestrian_meta")
    }

    pub fn script_path(&self) -> PathBuf {
        self.dir.path().join("run_fetch_track.sh")
    }

    fn staging_dir(&self) -> PathBuf {
        self.dir.path().join("staging")
    }

    pub fn read_conf(&self) -> Result<String> {
        fs::read_to_string(self.conf_path()).context("failed to read fetch_track conf")
    }

    pub fn write_conf(&self, content: &str) -> Result<()> {
        fs::write(self.conf_path(), content).context("failed to write fetch_track conf")
    }

    /// Écrit un fichier de détection dans pedestrian_meta/
    pub fn write_meta_file(&self, name: &str, lines: &[String]) -> Result<PathBuf> {
        write_lines(&self.meta_dir().join(name), lines)
    }

    pub fn write_meta_raw(&self, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.meta_dir().join(name);
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Nombre de fichiers (hors sous-répertoires) dans pedestrian_meta/
    pub fn meta_file_count(&self) -> Result<usize> {
        let mut count = 0;
        for entry in fs::read_dir(self.meta_dir())? {
            if entry?.file_type()?.is_file() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Installe un faux outil qui dépose `outputs` dans pedestrian_meta/ à chaque exécution
    pub fn install_tool_emitting(&self, outputs: &[(&str, Vec<String>)]) -> Result<()> {
        let mut body = String::new();
        for (name, lines) in outputs {
            let staged = write_lines(&self.staging_dir().join(name), lines)?;
            body.push_str(&format!(
                "cp {} {}\n",
                shell_quote(&staged),
                shell_quote(&self.meta_dir().join(name))
            ));
        }
        self.install_tool_with_body(&body)
    }

    /// Installe un run_fetch_track.sh avec le corps donné
    pub fn install_tool_with_body(&self, body: &str) -> Result<()> {
        let script = format!("#!/bin/sh\n{body}exit 0\n");
        fs::write(self.script_path(), script).context("failed to write run_fetch_track.sh")?;
        log::info!("installed fake fetch_track at {}", self.script_path().display());
        Ok(())
    }
}

fn write_lines(path: &Path, lines: &[String]) -> Result<PathBuf> {
    let mut content = lines.join("\n");
    if !lines.is_empty() {
        content.push('\n');
    }
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let fixture = FetchTrackFixture::new().unwrap();
        assert!(fixture.meta_dir().is_dir());
        assert_eq!(fixture.read_conf().unwrap(), DEFAULT_CONF);
        assert_eq!(fixture.meta_file_count().unwrap(), 0);
        assert!(!fixture.script_path().exists());
    }

    #[test]
    fn test_fake_tool_copies_outputs() {
        let fixture = FetchTrackFixture::new().unwrap();
        fixture.install_tool_emitting(&[("a.jsonl", vec!["{}".to_string()])]).unwrap();

        let status = std::process::Command::new("sh").arg(fixture.script_path()).status().unwrap();
        assert!(status.success());
        assert_eq!(fs::read_to_string(fixture.meta_dir().join("a.jsonl")).unwrap(), "{}\n");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote(Path::new("/tmp/it's")), r"'/tmp/it'\''s'");
    }
}
