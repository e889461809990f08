//! Rest interval between sets and exercises

use super::countdown::{Countdown, TimerError, TimerEvent};

/// Auto-started countdown with a "next up" label. Completes exactly once,
/// either by running out or by `skip()`.
#[derive(Debug, Clone)]
pub struct RestInterval {
    countdown: Countdown,
    next_label: String,
}

impl RestInterval {
    pub fn start(duration_secs: u32, next_label: impl Into<String>) -> Result<Self, TimerError> {
        Ok(Self {
            countdown: Countdown::started(duration_secs)?,
            next_label: next_label.into(),
        })
    }

    pub fn next_label(&self) -> &str {
        &self.next_label
    }

    pub fn remaining_secs(&self) -> u32 {
        self.countdown.remaining_secs()
    }

    pub fn duration_secs(&self) -> u32 {
        self.countdown.duration_secs()
    }

    pub fn progress_fraction(&self) -> f64 {
        self.countdown.progress_fraction()
    }

    pub fn is_complete(&self) -> bool {
        self.countdown.is_completed()
    }

    pub fn tick(&mut self) -> Option<TimerEvent> {
        self.countdown.tick()
    }

    /// End the rest now. Same completion as running out; `None` if the
    /// rest already completed.
    pub fn skip(&mut self) -> Option<TimerEvent> {
        self.countdown.finish_now()
    }
}
