use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::settings::WatchSettings;
use crate::watcher::text::split_list;
use crate::watcher::{CaptureTarget, WatchConfig};

#[derive(Parser, Debug)]
#[command(
    name = "donewatch",
    version,
    about = "Chimes when a watched screen area settles; ticks while a shell prints"
)]
pub struct Cli {
    /// Settings file to use instead of the per-user one
    #[arg(long, global = true, env = "DONEWATCH_SETTINGS", value_name = "PATH")]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch a screen region or window until it stops changing
    Watch(WatchArgs),
    /// List visible windows
    Windows {
        /// Only show titles containing this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Run a shell (or a command) with running ticks and a stop chime
    Shell {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "COMMAND")]
        command: Vec<String>,
    },
    /// Show or edit the persisted settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Play the running tick once
    TestTick,
    /// Play the stop tone(s) once
    TestStop,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    Show,
    Reset,
    /// Set one value, e.g. `beep.masterVolumePct 40` or `watch.keywords '["Done"]'`
    Set { key: String, value: String },
}

/// Flags left out fall back to the `watch` section of the settings file.
#[derive(Args, Debug, Default)]
#[command(group(ArgGroup::new("target").required(true).args(["region", "window"])))]
pub struct WatchArgs {
    /// Screen region as LEFT,TOP,WIDTH,HEIGHT
    #[arg(long, value_name = "L,T,W,H", allow_hyphen_values = true)]
    pub region: Option<CaptureTarget>,

    /// Watch the first window whose title contains this text
    #[arg(long, value_name = "FRAGMENT")]
    pub window: Option<String>,

    /// Seconds between captures
    #[arg(long, value_name = "SECS")]
    pub poll: Option<f64>,

    /// Seconds of no change before chiming
    #[arg(long, value_name = "SECS")]
    pub stable: Option<f64>,

    #[arg(long, value_name = "F")]
    pub pixel_threshold: Option<f32>,

    /// Comma-separated words that must be on screen
    #[arg(long, value_name = "a,b")]
    pub keywords: Option<String>,

    /// Comma-separated words that mean "still busy"
    #[arg(long, value_name = "a,b")]
    pub avoid: Option<String>,

    #[arg(long)]
    pub no_require_keyword: bool,

    /// Only finish when the text ends like a sentence
    #[arg(long)]
    pub require_end_punct: bool,

    /// WAV/MP3/OGG to play when done
    #[arg(long, value_name = "PATH")]
    pub done_sound: Option<PathBuf>,
}

impl WatchArgs {
    /// Layers the given flags over the persisted defaults.
    pub fn resolve_config(&self, base: &WatchConfig) -> WatchConfig {
        let mut config = base.clone();
        if let Some(poll) = self.poll {
            config.poll_secs = poll;
        }
        if let Some(stable) = self.stable {
            config.stable_secs = stable;
        }
        if let Some(threshold) = self.pixel_threshold {
            config.pixel_threshold = threshold;
        }
        if let Some(raw) = &self.keywords {
            config.keywords = split_list(raw);
        }
        if let Some(raw) = &self.avoid {
            config.avoid_words = split_list(raw);
        }
        if self.no_require_keyword {
            config.require_keyword = false;
        }
        if self.require_end_punct {
            config.require_end_punct = true;
        }
        config
    }

    pub fn resolve_done_sound(&self, settings: &WatchSettings) -> Option<PathBuf> {
        self.done_sound
            .clone()
            .or_else(|| settings.done_sound.clone())
    }
}
