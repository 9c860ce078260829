use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::WatchError;

/// Tunables for one watch run. Snapshotted at start, never mutated mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WatchConfig {
    /// Seconds between captures
    pub poll_secs: f64,

    /// How long both signals must stay quiet before the target counts as done
    pub stable_secs: f64,

    /// Mean absolute difference on the 64x64 gray grid that counts as a change
    pub pixel_threshold: f32,

    pub require_keyword: bool,
    pub require_end_punct: bool,
    pub keywords: Vec<String>,

    /// Words that mean the target is still busy ("typing", "generating", ...)
    pub avoid_words: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_secs: 0.8,
            stable_secs: 6.0,
            pixel_threshold: 0.005,
            require_keyword: true,
            require_end_punct: false,
            keywords: vec!["You".into(), "you".into()],
            avoid_words: vec![
                "typing".into(),
                "loading".into(),
                "generating".into(),
                "thinking".into(),
            ],
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<(), WatchError> {
        if !self.poll_secs.is_finite() || self.poll_secs <= 0.0 {
            return Err(WatchError::invalid("poll_secs", "must be greater than zero"));
        }
        if Duration::try_from_secs_f64(self.poll_secs).is_err() {
            return Err(WatchError::invalid(
                "poll_secs",
                format!("{} seconds is too long", self.poll_secs),
            ));
        }
        if !self.stable_secs.is_finite() || self.stable_secs < 0.0 {
            return Err(WatchError::invalid("stable_secs", "cannot be negative"));
        }
        if Duration::try_from_secs_f64(self.stable_secs).is_err() {
            return Err(WatchError::invalid(
                "stable_secs",
                format!("{} seconds is too long", self.stable_secs),
            ));
        }
        if !(0.0..=1.0).contains(&self.pixel_threshold) {
            return Err(WatchError::invalid(
                "pixel_threshold",
                format!("{} is outside [0, 1]", self.pixel_threshold),
            ));
        }
        Ok(())
    }

    /// Saturates instead of panicking on values `validate` would reject.
    pub fn poll_interval(&self) -> Duration {
        secs_or_max(self.poll_secs)
    }

    pub fn stable_threshold(&self) -> Duration {
        secs_or_max(self.stable_secs)
    }
}

fn secs_or_max(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
