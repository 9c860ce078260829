use std::time::Instant;

use crate::settings::BeepSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeepAction {
    Tick,
    Stop,
}

/// Decides when the shell wrapper ticks and when it plays the stop tone.
///
/// Output flips the scheduler into "writing"; while writing it yields one
/// [`BeepAction::Tick`] per tick gap, and once the child has been silent
/// for the quiet period it yields a single [`BeepAction::Stop`] and goes
/// idle until the next output.
#[derive(Debug, Default)]
pub struct BeepScheduler {
    writing: bool,
    last_output: Option<Instant>,
    next_tick: Option<Instant>,
}

impl BeepScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_output(&mut self, now: Instant) {
        self.last_output = Some(now);
        if !self.writing {
            self.writing = true;
            self.next_tick = Some(now);
        }
    }

    pub fn poll(&mut self, now: Instant, settings: &BeepSettings) -> Option<BeepAction> {
        if !self.writing {
            return None;
        }
        let last_output = self.last_output?;

        if now.saturating_duration_since(last_output) >= settings.quiet_period() {
            self.writing = false;
            self.next_tick = None;
            return Some(BeepAction::Stop);
        }

        match self.next_tick {
            Some(due) if now >= due => {
                self.next_tick = Some(now + settings.tick_gap());
                Some(BeepAction::Tick)
            }
            _ => None,
        }
    }
}
