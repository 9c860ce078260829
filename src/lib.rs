pub mod audio;
pub mod beeper;
pub mod capture;
pub mod cli;
pub mod error;
pub mod metrics;
pub mod notify;
pub mod ocr;
pub mod settings;
pub mod utils;
pub mod watcher;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

use audio::AudioEngineHandle;
use beeper::{BeepPlayer, ShellOptions};
use capture::ScreenCapture;
use cli::{Cli, Command, SettingsAction, WatchArgs};
use metrics::MetricsSnapshot;
use notify::ChimeNotifier;
use ocr::TesseractOcr;
use settings::SettingsStore;
use watcher::{CaptureTarget, Providers, WatchConfig, WatchController, WatchPhase};

/// Wait before exit when the chime's length can't be read from its file.
const SOUND_GRACE: Duration = Duration::from_millis(1500);
/// Slack after a sound's own length so the device drains before exit.
const SOUND_TAIL: Duration = Duration::from_millis(300);

/// Parses the command line and runs it. Returns the process exit code.
pub fn run() -> Result<i32> {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let path = match cli.settings {
        Some(path) => path,
        None => SettingsStore::default_path()?,
    };
    let store = SettingsStore::new(path)?;

    match cli.command {
        Command::Watch(args) => watch(args, &store),
        Command::Windows { filter } => list_windows(filter.as_deref()),
        Command::Shell { command } => shell(command, store),
        Command::Settings { action } => edit_settings(action, &store),
        Command::TestTick => preview_beep(&store, false),
        Command::TestStop => preview_beep(&store, true),
    }
}

fn watch(args: WatchArgs, store: &SettingsStore) -> Result<i32> {
    let settings = store.watch();
    let config = args.resolve_config(&settings.config);
    let target = resolve_target(&args)?;

    let audio = AudioEngineHandle::new();
    let chime = Arc::new(ChimeNotifier::new(
        audio.clone(),
        args.resolve_done_sound(&settings),
        settings.chime_volume_pct,
    ));
    let providers = Providers {
        frames: Arc::new(ScreenCapture),
        recognizer: Arc::new(
            TesseractOcr::new(&settings.tesseract_path)
                .with_language(settings.ocr_language.clone()),
        ),
        notifier: chime.clone(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start tokio runtime")?;
    let phase = runtime.block_on(supervise(target, config, providers))?;

    if matches!(phase, WatchPhase::Done) {
        std::thread::sleep(chime_wait(chime.duration()));
    }
    audio.shutdown();
    Ok(0)
}

fn chime_wait(length: Option<Duration>) -> Duration {
    length.map_or(SOUND_GRACE, |length| length.saturating_add(SOUND_TAIL))
}

fn resolve_target(args: &WatchArgs) -> Result<CaptureTarget> {
    if let Some(region) = args.region {
        return Ok(region);
    }
    let fragment = args
        .window
        .as_deref()
        .ok_or_else(|| anyhow!("either --region or --window is required"))?;
    let window = capture::find_window(fragment)?
        .ok_or_else(|| anyhow!("no visible window title contains '{fragment}'"))?;
    info!("Matched window '{}' ({})", window.title, window.app_name);
    Ok(CaptureTarget::Window { id: window.id })
}

/// Starts a run and reports its status until it finishes or Ctrl-C stops it.
async fn supervise(
    target: CaptureTarget,
    config: WatchConfig,
    providers: Providers,
) -> Result<WatchPhase> {
    let mut controller = WatchController::new();
    let mut status_rx = controller.subscribe();
    let run_id = controller.start(target, config, providers).await?;
    info!("Run {run_id} watching {target}; Ctrl-C to stop");

    let phase = loop {
        tokio::select! {
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break controller.wait().await?;
                }
                let status = status_rx.borrow_and_update().clone();
                info!("[{}] {}", status.cycles, status.message);
                if status.phase.is_terminal() {
                    break controller.wait().await?;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                break controller.stop().await?;
            }
        }
    };

    log_summary(&controller.metrics().await);
    Ok(phase)
}

fn log_summary(snapshot: &MetricsSnapshot) {
    let mean = snapshot
        .mean_cycle_ms()
        .map(|ms| format!("{ms:.0}ms"))
        .unwrap_or_else(|| "n/a".into());
    info!(
        "{} cycles ({} skipped, {} OCR failures), mean cycle {}, cpu {:.1}%, rss {:.1}MB",
        snapshot.cycle_count,
        snapshot.skipped_count,
        snapshot.ocr_failure_count,
        mean,
        snapshot.system.cpu_percent,
        snapshot.system.memory_mb
    );
}

fn list_windows(filter: Option<&str>) -> Result<i32> {
    let needle = filter.map(str::to_lowercase);
    let windows = capture::list_windows()?;
    let mut shown = 0;
    for window in &windows {
        if let Some(needle) = &needle {
            if !window.title.to_lowercase().contains(needle.as_str()) {
                continue;
            }
        }
        println!("{:>8}  {:<24}  {}", window.id, window.app_name, window.title);
        shown += 1;
    }
    if shown == 0 {
        warn!("No matching windows");
    }
    Ok(0)
}

fn shell(command: Vec<String>, store: SettingsStore) -> Result<i32> {
    let player = BeepPlayer::new(AudioEngineHandle::new());
    let code = beeper::run_shell(ShellOptions { command }, Arc::new(store), player.clone())?;
    player.shutdown();
    Ok(code)
}

fn edit_settings(action: SettingsAction, store: &SettingsStore) -> Result<i32> {
    match action {
        SettingsAction::Show => {
            info!("Settings file: {}", store.path().display());
            println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
        }
        SettingsAction::Reset => {
            store.reset()?;
            info!("Settings reset to defaults in {}", store.path().display());
        }
        SettingsAction::Set { key, value } => {
            store.set(&key, &value)?;
            info!("{key} updated in {}", store.path().display());
        }
    }
    Ok(0)
}

fn preview_beep(store: &SettingsStore, stop: bool) -> Result<i32> {
    let beep = store.beep();
    let player = BeepPlayer::new(AudioEngineHandle::new());
    let tail = if stop {
        player.stop(&beep);
        beep.second_stop_tone.unwrap_or(beep.stop_tone).duration()
    } else {
        player.tick(&beep);
        beep.tick.duration()
    };
    let volume = if stop { beep.stop_volume() } else { beep.tick_volume() };
    if volume == 0 {
        warn!("Volume is zero or muted; nothing to hear");
    }
    std::thread::sleep(tail + SOUND_TAIL);
    player.shutdown();
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chime_wait_covers_long_sound_files() {
        let wait = chime_wait(Some(Duration::from_secs(4)));
        assert_eq!(wait, Duration::from_secs(4) + SOUND_TAIL);
        assert!(wait > SOUND_GRACE);
    }

    #[test]
    fn chime_wait_falls_back_when_length_is_unknown() {
        assert_eq!(chime_wait(None), SOUND_GRACE);
    }
}
