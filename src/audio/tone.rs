use rodio::Source;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;

/// Short ramp at both ends so ticks don't click.
const FADE_MS: u32 = 4;

/// Frequency and length of a single beep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToneSpec {
    pub freq_hz: u32,
    pub dur_ms: u32,
}

impl ToneSpec {
    pub const fn new(freq_hz: u32, dur_ms: u32) -> Self {
        Self { freq_hz, dur_ms }
    }

    /// Zero-length or zero-frequency tones are skipped instead of played.
    pub fn is_audible(&self) -> bool {
        self.freq_hz > 0 && self.dur_ms > 0
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(u64::from(self.dur_ms))
    }
}

/// Finite mono sine wave.
pub struct Tone {
    freq: f32,
    sample_rate: u32,
    total_samples: usize,
    fade_samples: usize,
    num_sample: usize,
}

impl Tone {
    pub fn new(spec: ToneSpec) -> Self {
        let total_samples = (SAMPLE_RATE as usize * spec.dur_ms as usize) / 1000;
        let fade_samples = ((SAMPLE_RATE * FADE_MS / 1000) as usize).min(total_samples / 2);
        Self {
            freq: spec.freq_hz as f32,
            sample_rate: SAMPLE_RATE,
            total_samples: total_samples.max(1),
            fade_samples,
            num_sample: 0,
        }
    }

    fn envelope(&self) -> f32 {
        if self.fade_samples == 0 {
            return 1.0;
        }
        let from_start = self.num_sample;
        let to_end = self.total_samples - 1 - self.num_sample;
        let edge = from_start.min(to_end);
        if edge >= self.fade_samples {
            1.0
        } else {
            edge as f32 / self.fade_samples as f32
        }
    }
}

impl Iterator for Tone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }
        let t = self.num_sample as f32 / self.sample_rate as f32;
        let sample = (2.0 * PI * self.freq * t).sin() * self.envelope();
        self.num_sample += 1;
        Some(sample * 0.8)
    }
}

impl Source for Tone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.total_samples as f64 / f64::from(self.sample_rate),
        ))
    }
}
