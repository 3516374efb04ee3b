//! Binary entrypoint for the LED matrix player.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use rust_matrix_player::config::Configuration;
use rust_matrix_player::media::{self, ClassifyOptions};
use rust_matrix_player::scan::{self, ScanOptions};
use rust_matrix_player::sink;
use rust_matrix_player::tasks::player::Player;

#[derive(Debug, Parser)]
#[command(
    name = "matrix-player",
    version,
    about = "Cycle images, animations and videos from a directory onto an LED matrix"
)]
struct Args {
    /// Path to YAML config
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,
    /// Override the configured media directory
    #[arg(long, value_name = "DIR")]
    media_dir: Option<PathBuf>,
    /// Play one file on its own until interrupted
    #[arg(long, value_name = "FILE", conflicts_with = "list")]
    single: Option<PathBuf>,
    /// Classify the current playlist, print it and exit
    #[arg(long)]
    list: bool,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    let default = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // stdout may carry raw frames
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let Args {
        config,
        media_dir,
        single,
        list,
        verbose,
    } = Args::parse();
    init_tracing(verbose);

    let mut cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?;
    if let Some(dir) = media_dir {
        cfg.media_dir = dir;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    info!(
        media_dir = %cfg.media_dir.display(),
        geometry = %cfg.geometry(),
        hardware_mapping = %cfg.panel.hardware_mapping,
        scaling = %cfg.scaling,
        static_duration = %humantime::format_duration(cfg.static_duration),
        "configuration loaded"
    );

    if list {
        return print_playlist(&cfg);
    }

    let cancel = CancellationToken::new();
    spawn_signal_handlers(&cancel);

    let sink = sink::from_config(&cfg.sink, cfg.geometry()).context("failed to open frame sink")?;
    let mut player = Player::new(&cfg, sink, cancel);
    let result = match single {
        Some(path) => player.run_single(&path).await,
        None => player.run().await,
    };
    info!(frames = player.frames_pushed(), "player stopped");

    if let Err(err) = result {
        error!("{err}");
        return Err(err).context("playback failed");
    }
    Ok(())
}

fn spawn_signal_handlers(cancel: &CancellationToken) {
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = sigterm.recv() => {
                            info!("SIGTERM received; initiating shutdown");
                            cancel.cancel();
                        }
                    }
                }
                Err(err) => warn!("failed to register SIGTERM handler: {err}"),
            }
        });
    }
}

fn print_playlist(cfg: &Configuration) -> Result<()> {
    let mut entries = scan::enumerate(&cfg.media_dir, &ScanOptions::from_config(cfg))
        .context("failed to scan media directory")?;
    if let Some(seed) = cfg.shuffle_seed {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        scan::apply_order(&mut entries, cfg.playlist_order, &mut rng);
    } else {
        scan::apply_order(&mut entries, cfg.playlist_order, &mut rand::rng());
    }

    let opts = ClassifyOptions::from_config(cfg);
    for path in &entries {
        match media::classify(path, &opts) {
            Ok(item) => {
                let frames = item
                    .frame_count()
                    .map_or_else(|| "-".to_string(), |n| n.to_string());
                println!("{:<8} {:>6}  {}", item.kind(), frames, path.display());
            }
            Err(err) => println!("{:<8} {:>6}  {}  ({err})", "error", "-", path.display()),
        }
    }
    info!(count = entries.len(), "playlist listed");
    Ok(())
}
