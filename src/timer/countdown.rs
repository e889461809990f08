//! Restartable single-interval countdown
//!
//! ```text
//! Stopped -> Running <-> Paused
//!               |
//!               v
//!           Completed --reset--> Stopped
//! ```
//!
//! Completion is reported by exactly one `tick()` per arming. `reset()`
//! re-arms the countdown at its original duration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("countdown duration must be at least one second")]
    ZeroDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Stopped,
    Running,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// One second elapsed, more remain
    Tick { remaining_secs: u32 },
    /// Remaining time reached zero
    Completed,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    duration_secs: u32,
    remaining_secs: u32,
    state: TimerState,
}

impl Countdown {
    /// Create a stopped countdown. Zero durations are rejected.
    pub fn new(duration_secs: u32) -> Result<Self, TimerError> {
        if duration_secs == 0 {
            return Err(TimerError::ZeroDuration);
        }
        Ok(Self {
            duration_secs,
            remaining_secs: duration_secs,
            state: TimerState::Stopped,
        })
    }

    /// Create a countdown that is already running
    pub fn started(duration_secs: u32) -> Result<Self, TimerError> {
        let mut countdown = Self::new(duration_secs)?;
        countdown.start();
        Ok(countdown)
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    pub fn is_completed(&self) -> bool {
        self.state == TimerState::Completed
    }

    /// 0.0 .. 1.0 share of the duration already elapsed
    pub fn progress_fraction(&self) -> f64 {
        let elapsed = self.duration_secs - self.remaining_secs;
        elapsed as f64 / self.duration_secs as f64
    }

    /// Start from stopped or paused. Returns false if already running or completed.
    pub fn start(&mut self) -> bool {
        match self.state {
            TimerState::Stopped | TimerState::Paused => {
                self.state = TimerState::Running;
                true
            }
            TimerState::Running | TimerState::Completed => false,
        }
    }

    /// Freeze the remaining time
    pub fn pause(&mut self) -> bool {
        if self.state == TimerState::Running {
            self.state = TimerState::Paused;
            true
        } else {
            false
        }
    }

    pub fn resume(&mut self) -> bool {
        if self.state == TimerState::Paused {
            self.state = TimerState::Running;
            true
        } else {
            false
        }
    }

    /// Start/pause button behaviour
    pub fn toggle(&mut self) -> bool {
        match self.state {
            TimerState::Running => self.pause(),
            _ => self.start(),
        }
    }

    /// Back to the full duration, stopped, re-armed for completion
    pub fn reset(&mut self) {
        self.remaining_secs = self.duration_secs;
        self.state = TimerState::Stopped;
    }

    /// Advance by one second. Only a running countdown ticks.
    pub fn tick(&mut self) -> Option<TimerEvent> {
        if self.state != TimerState::Running {
            return None;
        }

        self.remaining_secs -= 1;
        if self.remaining_secs == 0 {
            self.state = TimerState::Completed;
            Some(TimerEvent::Completed)
        } else {
            Some(TimerEvent::Tick { remaining_secs: self.remaining_secs })
        }
    }

    /// Jump straight to completion. Returns `None` if already completed.
    pub(crate) fn finish_now(&mut self) -> Option<TimerEvent> {
        if self.state == TimerState::Completed {
            return None;
        }
        self.remaining_secs = 0;
        self.state = TimerState::Completed;
        Some(TimerEvent::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_duration_rejected() {
        assert_eq!(Countdown::new(0).unwrap_err(), TimerError::ZeroDuration);
        assert_eq!(Countdown::started(0).unwrap_err(), TimerError::ZeroDuration);
    }

    #[test]
    fn test_new_is_stopped() {
        let timer = Countdown::new(30).unwrap();
        assert_eq!(timer.state(), TimerState::Stopped);
        assert_eq!(timer.remaining_secs(), 30);
        assert_eq!(timer.progress_fraction(), 0.0);
    }

    #[test]
    fn test_stopped_timer_does_not_tick() {
        let mut timer = Countdown::new(5).unwrap();
        assert_eq!(timer.tick(), None);
        assert_eq!(timer.remaining_secs(), 5);
    }

    #[test]
    fn test_countdown_visits_every_second() {
        for duration in 1..=12 {
            let mut timer = Countdown::started(duration).unwrap();
            let mut completions = 0;
            for expected in (0..duration).rev() {
                let event = timer.tick();
                assert_eq!(timer.remaining_secs(), expected);
                if expected == 0 {
                    assert_eq!(event, Some(TimerEvent::Completed));
                    completions += 1;
                } else {
                    assert_eq!(event, Some(TimerEvent::Tick { remaining_secs: expected }));
                }
            }
            assert_eq!(completions, 1);
            // Nothing after completion
            assert_eq!(timer.tick(), None);
            assert_eq!(timer.tick(), None);
        }
    }

    #[test]
    fn test_progress_is_monotonic_and_bounded() {
        let mut timer = Countdown::started(7).unwrap();
        let mut last = timer.progress_fraction();
        while timer.tick().is_some() {
            let progress = timer.progress_fraction();
            assert!(progress >= last);
            assert!((0.0..=1.0).contains(&progress));
            last = progress;
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_pause_freezes_remaining() {
        let mut timer = Countdown::started(10).unwrap();
        timer.tick();
        timer.tick();
        assert!(timer.pause());
        assert_eq!(timer.tick(), None);
        assert_eq!(timer.tick(), None);
        assert_eq!(timer.remaining_secs(), 8);
        assert!(timer.resume());
        assert_eq!(timer.tick(), Some(TimerEvent::Tick { remaining_secs: 7 }));
    }

    #[test]
    fn test_reset_restores_duration_and_stops() {
        let mut timer = Countdown::started(3).unwrap();
        timer.tick();
        timer.reset();
        assert_eq!(timer.state(), TimerState::Stopped);
        assert_eq!(timer.remaining_secs(), 3);
        assert_eq!(timer.tick(), None);
    }

    #[test]
    fn test_reset_rearms_completion() {
        let mut timer = Countdown::started(1).unwrap();
        assert_eq!(timer.tick(), Some(TimerEvent::Completed));
        assert!(!timer.start());

        timer.reset();
        assert!(timer.start());
        assert_eq!(timer.tick(), Some(TimerEvent::Completed));
    }

    #[test]
    fn test_toggle() {
        let mut timer = Countdown::new(4).unwrap();
        assert!(timer.toggle());
        assert!(timer.is_running());
        assert!(timer.toggle());
        assert_eq!(timer.state(), TimerState::Paused);
        assert!(timer.toggle());
        assert!(timer.is_running());
    }

    #[test]
    fn test_finish_now_fires_once() {
        let mut timer = Countdown::started(30).unwrap();
        timer.tick();
        assert_eq!(timer.finish_now(), Some(TimerEvent::Completed));
        assert_eq!(timer.finish_now(), None);
        assert_eq!(timer.tick(), None);
        assert_eq!(timer.progress_fraction(), 1.0);
    }
}
