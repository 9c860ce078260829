pub mod tone;

pub use tone::{Tone, ToneSpec};

use anyhow::{anyhow, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{
    mpsc::{self, Sender},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

pub enum Sound {
    Tone(ToneSpec),
    /// A sound file, with the tone to play if it cannot be decoded.
    File { path: PathBuf, fallback: ToneSpec },
}

impl Sound {
    /// Play length, or `None` when the file's decoder can't tell.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Sound::Tone(spec) => Some(spec.duration()),
            Sound::File { path, fallback } => match open_decoder(path) {
                Ok(decoder) => decoder.total_duration(),
                Err(_) => Some(fallback.duration()),
            },
        }
    }
}

enum AudioCommand {
    Play {
        sound: Sound,
        volume: f32,
        bell_on_failure: bool,
    },
    Shutdown,
}

/// Handle to the dedicated audio thread.
///
/// The output stream is not `Send`, so it lives on its own thread and every
/// caller talks to it over a channel. Playback is fire-and-forget: each
/// sound gets a detached sink and `play` returns immediately.
#[derive(Clone)]
pub struct AudioEngineHandle {
    tx: Arc<Mutex<Option<Sender<AudioCommand>>>>,
}

impl AudioEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
        let mut guard = self
            .tx
            .lock()
            .map_err(|_| anyhow!("audio engine lock poisoned"))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || {
                let mut stream: Option<(OutputStream, OutputStreamHandle)> = None;

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play {
                            sound,
                            volume,
                            bell_on_failure,
                        } => {
                            if let Err(err) = play_on(&mut stream, sound, volume) {
                                log_warn!("audio playback failed: {err}");
                                // A broken device handle is rebuilt on the next sound
                                stream = None;
                                if bell_on_failure {
                                    ring_terminal_bell();
                                }
                            }
                        }
                        AudioCommand::Shutdown => break,
                    }
                }
                log_debug!("audio engine thread exiting");
            })?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    /// `volume_pct` is 0..=100; zero is treated as "don't play".
    pub fn play(&self, sound: Sound, volume_pct: u8) -> Result<()> {
        self.send_play(sound, volume_pct, false)
    }

    /// Like [`play`](Self::play) but rings the terminal bell if no audio
    /// device can be opened.
    pub fn play_or_bell(&self, sound: Sound, volume_pct: u8) -> Result<()> {
        self.send_play(sound, volume_pct, true)
    }

    fn send_play(&self, sound: Sound, volume_pct: u8, bell_on_failure: bool) -> Result<()> {
        if volume_pct == 0 {
            return Ok(());
        }
        let tx = self.ensure_thread()?;
        tx.send(AudioCommand::Play {
            sound,
            volume: f32::from(volume_pct.min(100)) / 100.0,
            bell_on_failure,
        })
        .map_err(|_| anyhow!("audio engine thread is gone"))
    }

    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.tx.lock() {
            if let Some(tx) = guard.take() {
                let _ = tx.send(AudioCommand::Shutdown);
            }
        }
    }
}

impl Default for AudioEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

fn play_on(
    stream: &mut Option<(OutputStream, OutputStreamHandle)>,
    sound: Sound,
    volume: f32,
) -> Result<()> {
    if stream.is_none() {
        let opened = OutputStream::try_default()
            .map_err(|err| anyhow!("failed to open audio output: {err}"))?;
        *stream = Some(opened);
    }
    let (_, handle) = stream
        .as_ref()
        .ok_or_else(|| anyhow!("audio output unavailable"))?;

    let sink = Sink::try_new(handle).map_err(|err| anyhow!("failed to create sink: {err}"))?;
    sink.set_volume(volume.clamp(0.0, 1.0));

    match sound {
        Sound::Tone(spec) => {
            if spec.is_audible() {
                sink.append(Tone::new(spec));
            }
        }
        Sound::File { path, fallback } => match open_decoder(&path) {
            Ok(decoder) => sink.append(decoder),
            Err(err) => {
                log_warn!("can't play {}: {err}; using tone", path.display());
                sink.append(Tone::new(fallback));
            }
        },
    }

    sink.detach();
    Ok(())
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(Decoder::new(BufReader::new(file))?)
}

fn ring_terminal_bell() {
    let mut stderr = std::io::stderr();
    let _ = stderr.write_all(b"\x07");
    let _ = stderr.flush();
}
