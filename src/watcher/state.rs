use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::config::WatchConfig;
use super::fingerprint::{has_changed, PixelFingerprint};
use super::policy::{avoid_policy_triggered, keyword_policy_satisfied};
use super::text::normalize_text;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum WatchPhase {
    #[default]
    Idle,
    Running,
    Done,
    Stopped,
}

impl WatchPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, WatchPhase::Done | WatchPhase::Stopped)
    }
}

/// Outcome of feeding one capture into [`RunState::observe`].
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub pixels_changed: bool,
    pub text_changed: bool,
    pub stable_for: Duration,
    pub keyword_ok: bool,
    pub avoid_hit: bool,
    pub done: bool,
}

impl Verdict {
    pub fn status_line(&self) -> String {
        format!(
            "Stable: {:.1}s | Keyword: {} | Avoid: {}",
            self.stable_for.as_secs_f64(),
            self.keyword_ok,
            self.avoid_hit
        )
    }
}

/// Per-run memory of the previous cycle.
#[derive(Debug, Clone)]
pub struct RunState {
    last_fingerprint: Option<PixelFingerprint>,
    last_text: String,
    last_change: Instant,
}

impl RunState {
    pub fn new(started_at: Instant) -> Self {
        Self {
            last_fingerprint: None,
            last_text: String::new(),
            last_change: started_at,
        }
    }

    /// Folds one cycle's signals into the state and decides completion.
    ///
    /// `text` is `None` when recognition failed; the snapshot is then left
    /// as it was and does not count as a change.
    pub fn observe(
        &mut self,
        fingerprint: PixelFingerprint,
        text: Option<&str>,
        now: Instant,
        config: &WatchConfig,
    ) -> Verdict {
        let pixels_changed = has_changed(
            self.last_fingerprint.as_ref(),
            &fingerprint,
            config.pixel_threshold,
        );
        self.last_fingerprint = Some(fingerprint);

        let text_changed = match text.map(normalize_text) {
            Some(clean) if clean != self.last_text => {
                self.last_text = clean;
                true
            }
            _ => false,
        };

        if (pixels_changed || text_changed) && now > self.last_change {
            self.last_change = now;
        }

        let stable_for = now.saturating_duration_since(self.last_change);
        let keyword_ok = keyword_policy_satisfied(&self.last_text, config);
        let avoid_hit = avoid_policy_triggered(&self.last_text, config);
        let done = stable_for >= config.stable_threshold() && keyword_ok && !avoid_hit;

        Verdict {
            pixels_changed,
            text_changed,
            stable_for,
            keyword_ok,
            avoid_hit,
            done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    fn frame(level: u8) -> PixelFingerprint {
        PixelFingerprint::from_image(&DynamicImage::ImageRgb8(RgbImage::from_pixel(
            96,
            96,
            Rgb([level, level, level]),
        )))
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn unchanging_target_is_done_on_first_cycle_with_zero_threshold() {
        let config = WatchConfig {
            stable_secs: 0.0,
            require_keyword: false,
            avoid_words: Vec::new(),
            ..WatchConfig::default()
        };
        let t0 = Instant::now();
        let mut state = RunState::new(t0);
        let verdict = state.observe(frame(40), Some("anything"), t0, &config);
        assert!(verdict.pixels_changed);
        assert!(verdict.done);
    }

    #[test]
    fn repeated_input_never_advances_last_change() {
        let config = WatchConfig::default();
        let t0 = Instant::now();
        let mut state = RunState::new(t0);
        state.observe(frame(90), Some("hello  world"), t0, &config);
        let after_first = state.last_change;

        let verdict = state.observe(frame(90), Some("hello world"), t0 + secs(1), &config);
        assert!(!verdict.pixels_changed);
        assert!(!verdict.text_changed);
        assert_eq!(state.last_change, after_first);

        state.observe(frame(90), Some("hello\nworld"), t0 + secs(2), &config);
        assert_eq!(state.last_change, after_first);
    }

    #[test]
    fn keyword_scenario_completes_at_threshold_not_before() {
        let config = WatchConfig {
            poll_secs: 1.0,
            stable_secs: 3.0,
            require_keyword: true,
            keywords: vec!["You".into()],
            avoid_words: Vec::new(),
            ..WatchConfig::default()
        };
        let t0 = Instant::now();
        let mut state = RunState::new(t0);

        let mut done_at = None;
        for tick in 0..10u64 {
            let verdict = state.observe(frame(120), Some("You: hi there"), t0 + secs(tick), &config);
            if verdict.done {
                done_at = Some(tick);
                break;
            }
        }
        assert_eq!(done_at, Some(3));
    }

    #[test]
    fn avoid_word_blocks_forever() {
        let config = WatchConfig {
            stable_secs: 1.0,
            require_keyword: false,
            avoid_words: vec!["typing".into()],
            ..WatchConfig::default()
        };
        let t0 = Instant::now();
        let mut state = RunState::new(t0);
        for tick in 0..100u64 {
            let verdict = state.observe(frame(10), Some("Bot is typing..."), t0 + secs(tick), &config);
            assert!(verdict.avoid_hit);
            assert!(!verdict.done, "declared done at cycle {tick}");
        }
        assert_eq!(state.last_change, t0);
    }

    #[test]
    fn keyword_and_avoid_together_block() {
        let config = WatchConfig {
            stable_secs: 0.0,
            keywords: vec!["You".into()],
            avoid_words: vec!["thinking".into()],
            ..WatchConfig::default()
        };
        let t0 = Instant::now();
        let mut state = RunState::new(t0);
        let verdict = state.observe(frame(10), Some("You: thinking"), t0, &config);
        assert!(verdict.keyword_ok);
        assert!(!verdict.done);
    }

    #[test]
    fn failed_recognition_keeps_previous_text() {
        let config = WatchConfig {
            stable_secs: 2.0,
            require_keyword: false,
            avoid_words: Vec::new(),
            ..WatchConfig::default()
        };
        let t0 = Instant::now();
        let mut state = RunState::new(t0);
        state.observe(frame(60), Some("first"), t0, &config);

        let verdict = state.observe(frame(60), None, t0 + secs(2), &config);
        assert!(!verdict.text_changed);
        assert_eq!(state.last_text, "first");
        assert!(verdict.done);
    }

    #[test]
    fn pixel_change_resets_stability() {
        let config = WatchConfig {
            stable_secs: 2.0,
            require_keyword: false,
            avoid_words: Vec::new(),
            ..WatchConfig::default()
        };
        let t0 = Instant::now();
        let mut state = RunState::new(t0);
        state.observe(frame(0), Some(""), t0, &config);
        state.observe(frame(0), Some(""), t0 + secs(1), &config);
        let verdict = state.observe(frame(255), Some(""), t0 + secs(2), &config);
        assert!(verdict.pixels_changed);
        assert_eq!(verdict.stable_for, Duration::ZERO);
        assert_eq!(state.last_change, t0 + secs(2));
    }

    #[test]
    fn status_line_format() {
        let verdict = Verdict {
            pixels_changed: false,
            text_changed: false,
            stable_for: Duration::from_millis(1300),
            keyword_ok: true,
            avoid_hit: false,
            done: false,
        };
        assert_eq!(verdict.status_line(), "Stable: 1.3s | Keyword: true | Avoid: false");
    }
}
