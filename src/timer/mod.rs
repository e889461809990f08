//! Timers - single-interval countdown and the rest interval built on it
//!
//! Timers have no threads of their own. The owner calls `tick()` once per
//! elapsed second; the terminal UI does this from its event loop.

mod countdown;
mod rest;

pub use countdown::{Countdown, TimerError, TimerEvent, TimerState};
pub use rest::RestInterval;
