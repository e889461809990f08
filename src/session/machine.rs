//! Session state machine
//!
//! Walks a plan's exercises and sets, puts a rest interval between sets and
//! between exercises, and ends in `Finished` with the elapsed wall-clock time.
//!
//! ```text
//! Working(i, s) --advance--> Resting(i, s) --rest done--> Working(i, s+1)
//!                                          \-------------> Working(i+1, 1)
//! Working(last, last) --advance--> Finished
//! AwaitingConfirmation --advance--> Finished   (rest days)
//! ```
//!
//! Only one timer exists at a time: the hold timer of a timed exercise while
//! working, or the rest interval while resting.

use chrono::{DateTime, Utc};

use crate::catalog::{Exercise, WorkUnit, WorkoutPlan};
use crate::timer::{Countdown, RestInterval, TimerEvent};

/// Label shown as "next up" when nothing follows
pub const FINISH_LABEL: &str = "Finish";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Rest day, waiting for the user's confirmation
    AwaitingConfirmation,
    Working { exercise_index: usize, set_number: u32 },
    Resting { exercise_index: usize, set_number: u32 },
    Finished { duration_secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    RestStarted { rest_secs: u32, next_up: String },
    RestTick { remaining_secs: u32 },
    SetStarted { exercise_index: usize, set_number: u32 },
    HoldTick { remaining_secs: u32 },
    HoldComplete,
    Finished { duration_secs: u64 },
    /// Advance arrived while a rest was still running
    Ignored,
}

#[derive(Debug, Clone)]
enum ActiveTimer {
    Idle,
    Hold(Countdown),
    Rest(RestInterval),
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    plan: WorkoutPlan,
    state: SessionState,
    started_at: DateTime<Utc>,
    timer: ActiveTimer,
}

impl SessionMachine {
    pub fn new(plan: WorkoutPlan) -> Self {
        Self::starting_at(plan, Utc::now())
    }

    /// Build a machine whose session started at `started_at`.
    ///
    /// # Panics
    /// If a standard plan has no exercises.
    pub fn starting_at(plan: WorkoutPlan, started_at: DateTime<Utc>) -> Self {
        let state = if plan.is_rest() {
            SessionState::AwaitingConfirmation
        } else {
            assert!(
                !plan.exercises().is_empty(),
                "standard workout '{}' has no exercises",
                plan.title()
            );
            SessionState::Working { exercise_index: 0, set_number: 1 }
        };

        let mut machine = Self {
            plan,
            state,
            started_at,
            timer: ActiveTimer::Idle,
        };
        machine.arm_hold_timer();
        machine
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn plan(&self) -> &WorkoutPlan {
        &self.plan
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Finished { .. })
    }

    pub fn duration_secs(&self) -> Option<u64> {
        match self.state {
            SessionState::Finished { duration_secs } => Some(duration_secs),
            _ => None,
        }
    }

    /// Exercise being worked on or rested after
    pub fn current_exercise(&self) -> Option<&Exercise> {
        match self.state {
            SessionState::Working { exercise_index, .. }
            | SessionState::Resting { exercise_index, .. } => self.plan.exercises().get(exercise_index),
            _ => None,
        }
    }

    pub fn hold_timer(&self) -> Option<&Countdown> {
        match &self.timer {
            ActiveTimer::Hold(countdown) => Some(countdown),
            _ => None,
        }
    }

    pub fn rest(&self) -> Option<&RestInterval> {
        match &self.timer {
            ActiveTimer::Rest(rest) => Some(rest),
            _ => None,
        }
    }

    /// Sets marked done so far
    pub fn completed_sets(&self) -> u32 {
        let before = |index: usize| -> u32 {
            self.plan.exercises()[..index].iter().map(|e| e.set_count).sum()
        };
        match self.state {
            SessionState::AwaitingConfirmation => 0,
            SessionState::Working { exercise_index, set_number } => before(exercise_index) + set_number - 1,
            SessionState::Resting { exercise_index, set_number } => before(exercise_index) + set_number,
            SessionState::Finished { .. } => self.plan.total_sets(),
        }
    }

    /// True when the next advance ends the session
    pub fn on_final_set(&self) -> bool {
        match self.state {
            SessionState::AwaitingConfirmation => true,
            SessionState::Working { exercise_index, set_number } => {
                let exercises = self.plan.exercises();
                exercise_index == exercises.len() - 1
                    && set_number == exercises[exercise_index].set_count
            }
            _ => false,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn advance(&mut self) -> SessionEvent {
        self.advance_at(Utc::now())
    }

    /// Mark the current set done (or confirm a rest day) at time `now`.
    ///
    /// # Panics
    /// If the session is already finished.
    pub fn advance_at(&mut self, now: DateTime<Utc>) -> SessionEvent {
        match self.state {
            SessionState::Finished { .. } => panic!("advance called on a finished session"),
            SessionState::AwaitingConfirmation => self.finish(0),
            SessionState::Resting { .. } => SessionEvent::Ignored,
            SessionState::Working { exercise_index, set_number } => {
                let exercises = self.plan.exercises();
                let exercise = &exercises[exercise_index];
                let last_set = set_number == exercise.set_count;
                let last_exercise = exercise_index == exercises.len() - 1;

                if last_set && last_exercise {
                    let elapsed = (now - self.started_at).num_seconds().max(0) as u64;
                    return self.finish(elapsed);
                }

                let rest_secs = exercise.rest_secs;
                let next_up = self.next_up_label(exercise_index, set_number);
                let rest = RestInterval::start(rest_secs, next_up.clone())
                    .expect("rest seconds are validated by the catalog");
                self.timer = ActiveTimer::Rest(rest);
                self.state = SessionState::Resting { exercise_index, set_number };
                SessionEvent::RestStarted { rest_secs, next_up }
            }
        }
    }

    /// One second elapsed
    pub fn tick(&mut self) -> Option<SessionEvent> {
        let rest_event = match &mut self.timer {
            ActiveTimer::Idle => return None,
            ActiveTimer::Hold(countdown) => {
                return countdown.tick().map(|event| match event {
                    TimerEvent::Tick { remaining_secs } => SessionEvent::HoldTick { remaining_secs },
                    TimerEvent::Completed => SessionEvent::HoldComplete,
                });
            }
            ActiveTimer::Rest(rest) => rest.tick()?,
        };

        Some(match rest_event {
            TimerEvent::Tick { remaining_secs } => SessionEvent::RestTick { remaining_secs },
            TimerEvent::Completed => self.end_rest(),
        })
    }

    /// Cut the current rest short. `None` when not resting.
    pub fn skip_rest(&mut self) -> Option<SessionEvent> {
        let ActiveTimer::Rest(rest) = &mut self.timer else {
            return None;
        };
        rest.skip()?;
        Some(self.end_rest())
    }

    /// Start or pause the hold timer of a timed exercise
    pub fn toggle_hold(&mut self) -> bool {
        match &mut self.timer {
            ActiveTimer::Hold(countdown) => countdown.toggle(),
            _ => false,
        }
    }

    pub fn reset_hold(&mut self) -> bool {
        match &mut self.timer {
            ActiveTimer::Hold(countdown) => {
                countdown.reset();
                true
            }
            _ => false,
        }
    }

    // ── Internals ────────────────────────────────────────────────────

    fn next_up_label(&self, exercise_index: usize, set_number: u32) -> String {
        let exercises = self.plan.exercises();
        let exercise = &exercises[exercise_index];
        if set_number < exercise.set_count {
            format!("{} (Set {})", exercise.name, set_number + 1)
        } else {
            exercises
                .get(exercise_index + 1)
                .map(|next| next.name.clone())
                .unwrap_or_else(|| FINISH_LABEL.to_string())
        }
    }

    fn end_rest(&mut self) -> SessionEvent {
        let SessionState::Resting { exercise_index, set_number } = self.state else {
            unreachable!("rest timer running outside the resting state");
        };

        let (exercise_index, set_number) = if set_number < self.plan.exercises()[exercise_index].set_count {
            (exercise_index, set_number + 1)
        } else {
            (exercise_index + 1, 1)
        };

        self.state = SessionState::Working { exercise_index, set_number };
        self.timer = ActiveTimer::Idle;
        self.arm_hold_timer();
        SessionEvent::SetStarted { exercise_index, set_number }
    }

    fn arm_hold_timer(&mut self) {
        let hold_secs = match self.current_exercise() {
            Some(Exercise { work: WorkUnit::TimedHold(secs), .. }) => *secs,
            _ => return,
        };
        if let Ok(countdown) = Countdown::new(hold_secs) {
            self.timer = ActiveTimer::Hold(countdown);
        }
    }

    fn finish(&mut self, duration_secs: u64) -> SessionEvent {
        self.timer = ActiveTimer::Idle;
        self.state = SessionState::Finished { duration_secs };
        SessionEvent::Finished { duration_secs }
    }
}
