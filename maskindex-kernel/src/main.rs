/**
 * MASKINDEX KERNEL - Point d'entrée du service d'indice masque
 *
 * RÔLE : Orchestration des modules : config, cache, pipeline fetch_track, scheduler.
 * Bootstrap du système complet avec gestion d'erreurs et logging.
 *
 * ARCHITECTURE : cycle périodique patch conf → fetch_track → scan → cache,
 * lecture du classement avec repli synchrone.
 */

mod cache;
mod conf_patch;
mod config;
mod models;
mod pipeline;
mod runner;
mod scanner;
mod scheduler;

use crate::cache::create_cache;
use crate::config::load_config;
use crate::pipeline::MaskPipeline;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "maskindex-kernel", version, about = "Indice de port du masque par caméra")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rafraîchit le classement périodiquement jusqu'à Ctrl-C (défaut)
    Serve,
    /// Exécute un seul cycle complet et affiche son bilan
    RunOnce,
    /// Affiche le classement courant (cache, sinon recalcul) en JSON
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("maskindex_kernel=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // config résolue une fois, immuable ensuite
    let cfg = load_config().await;
    let paths = cfg.paths();
    info!("[kernel] fetch_track work dir: {:?}", paths.work_dir);

    let cache = create_cache(&cfg.cache).context("failed to open cache")?;
    let pipeline = Arc::new(MaskPipeline::new(&cfg.fetch_track, paths, cache));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let handle = scheduler::spawn_refresh_scheduler(
                pipeline.clone(),
                Duration::from_secs(cfg.fetch_track.interval_secs),
            );
            tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
            info!("[kernel] shutdown requested");
            handle.abort();
        }
        Command::RunOnce => {
            let report = pipeline.run_cycle().await;
            println!(
                "cycle {} started_at={} patch={:?} run={:?} files={} failed={} records={} skipped_lines={} published={}",
                report.cycle_id,
                report.started_at,
                report.patch,
                report.run,
                report.scan.files_scanned,
                report.scan.files_failed,
                report.scan.records,
                report.scan.skipped_lines,
                report.published
            );
            println!("{}", serde_json::to_string(&report.scan.entries)?);
        }
        Command::Show => {
            let entries = pipeline.get_center_mask_data().await;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }

    Ok(())
}
