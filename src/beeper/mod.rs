pub mod scheduler;
pub mod session;

pub use scheduler::{BeepAction, BeepScheduler};
pub use session::{run_shell, ShellOptions};

use std::thread;
use std::time::Duration;

use crate::audio::{AudioEngineHandle, Sound};
use crate::settings::BeepSettings;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Pause between the end of the first stop tone and the second one.
pub const SECOND_TONE_GAP: Duration = Duration::from_millis(50);

/// Turns scheduler actions into sounds at the configured volumes.
#[derive(Clone, Default)]
pub struct BeepPlayer {
    audio: AudioEngineHandle,
}

impl BeepPlayer {
    pub fn new(audio: AudioEngineHandle) -> Self {
        Self { audio }
    }

    pub fn play(&self, action: BeepAction, settings: &BeepSettings) {
        match action {
            BeepAction::Tick => self.tick(settings),
            BeepAction::Stop => self.stop(settings),
        }
    }

    pub fn tick(&self, settings: &BeepSettings) {
        if let Err(err) = self.audio.play(Sound::Tone(settings.tick), settings.tick_volume()) {
            log_warn!("tick failed: {err}");
        }
    }

    /// Plays the stop tone and, when configured, the second one after it.
    /// Blocks for the length of the first tone when a second one follows.
    pub fn stop(&self, settings: &BeepSettings) {
        let volume = settings.stop_volume();
        if let Err(err) = self.audio.play(Sound::Tone(settings.stop_tone), volume) {
            log_warn!("stop tone failed: {err}");
            return;
        }
        if let Some(second) = settings.second_stop_tone {
            if volume == 0 {
                return;
            }
            thread::sleep(settings.stop_tone.duration() + SECOND_TONE_GAP);
            if let Err(err) = self.audio.play(Sound::Tone(second), volume) {
                log_warn!("second stop tone failed: {err}");
            }
        }
    }

    pub fn shutdown(&self) {
        self.audio.shutdown();
    }
}
