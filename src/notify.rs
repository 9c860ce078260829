use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{AudioEngineHandle, Sound, ToneSpec};
use crate::watcher::DoneNotifier;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

pub const DONE_TONE: ToneSpec = ToneSpec::new(1000, 400);

/// Plays the "done" sound: a configured sound file if it exists, otherwise
/// a synthesized beep, otherwise the terminal bell.
pub struct ChimeNotifier {
    audio: AudioEngineHandle,
    sound_file: Option<PathBuf>,
    volume_pct: u8,
}

impl ChimeNotifier {
    pub fn new(audio: AudioEngineHandle, sound_file: Option<PathBuf>, volume_pct: u8) -> Self {
        Self {
            audio,
            sound_file,
            volume_pct,
        }
    }

    /// How long the chime plays, when the sound file's length is known.
    pub fn duration(&self) -> Option<Duration> {
        self.sound().duration()
    }

    fn sound(&self) -> Sound {
        match &self.sound_file {
            Some(path) if path.is_file() => Sound::File {
                path: path.clone(),
                fallback: DONE_TONE,
            },
            Some(path) => {
                log_warn!("done sound {} not found; using tone", path.display());
                Sound::Tone(DONE_TONE)
            }
            None => Sound::Tone(DONE_TONE),
        }
    }
}

impl DoneNotifier for ChimeNotifier {
    fn notify(&self) {
        log_info!("target settled, chiming");
        if let Err(err) = self.audio.play_or_bell(self.sound(), self.volume_pct) {
            log_warn!("chime failed ({err}); ringing bell");
            eprint!("\x07");
        }
    }
}
