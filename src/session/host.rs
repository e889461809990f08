//! Session host - one state machine per active session
//!
//! Resolves the plan for the selected day, forwards user actions and ticks
//! to the machine, and turns a finished machine into a completion record.
//! Cancelling drops the machine; nothing is written for that session.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use super::machine::{SessionEvent, SessionMachine};
use crate::catalog::Catalog;
use crate::db::CompletionRecord;
use crate::store::{AppendOutcome, ProgressStore};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("day {0} is not part of the program")]
    UnknownDay(u8),

    #[error("a session for day {0} is already running")]
    SessionActive(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Session(SessionEvent),
    /// The session finished and its machine was discarded
    Completed(CompletionRecord),
}

/// What happened to a committed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Saved,
    /// Kept locally, remote sync still owed
    Pending { reason: String },
    /// The store refused it; only the in-memory copy exists
    Failed { reason: String },
}

struct ActiveSession {
    day: u8,
    machine: SessionMachine,
}

pub struct SessionHost<S: ProgressStore + ?Sized> {
    catalog: Arc<Catalog>,
    store: Arc<S>,
    active: Option<ActiveSession>,
}

impl<S: ProgressStore + ?Sized> SessionHost<S> {
    pub fn new(catalog: Arc<Catalog>, store: Arc<S>) -> Self {
        Self {
            catalog,
            store,
            active: None,
        }
    }

    pub fn begin(&mut self, day: u8) -> Result<&SessionMachine, HostError> {
        if let Some(active) = &self.active {
            return Err(HostError::SessionActive(active.day));
        }
        let plan = self
            .catalog
            .workout_for_day(day)
            .ok_or(HostError::UnknownDay(day))?
            .clone();

        info!("Starting session for day {} ({})", day, plan.title());
        let active = self.active.insert(ActiveSession {
            day,
            machine: SessionMachine::new(plan),
        });
        Ok(&active.machine)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_day(&self) -> Option<u8> {
        self.active.as_ref().map(|a| a.day)
    }

    pub fn machine(&self) -> Option<&SessionMachine> {
        self.active.as_ref().map(|a| &a.machine)
    }

    /// Mark the current set done or confirm a rest day
    pub fn advance(&mut self) -> Option<HostEvent> {
        let active = self.active.as_mut()?;
        match active.machine.advance() {
            SessionEvent::Finished { duration_secs } => Some(self.complete(duration_secs)),
            event => Some(HostEvent::Session(event)),
        }
    }

    /// One second elapsed. No-op without an active session.
    pub fn tick(&mut self) -> Option<HostEvent> {
        let event = self.active.as_mut()?.machine.tick()?;
        Some(HostEvent::Session(event))
    }

    pub fn skip_rest(&mut self) -> Option<HostEvent> {
        let event = self.active.as_mut()?.machine.skip_rest()?;
        Some(HostEvent::Session(event))
    }

    pub fn toggle_hold(&mut self) -> bool {
        self.active.as_mut().is_some_and(|a| a.machine.toggle_hold())
    }

    pub fn reset_hold(&mut self) -> bool {
        self.active.as_mut().is_some_and(|a| a.machine.reset_hold())
    }

    /// Drop the active session without writing anything
    pub fn cancel(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                info!(
                    "Cancelled day {} after {} sets",
                    active.day,
                    active.machine.completed_sets()
                );
                true
            }
            None => false,
        }
    }

    fn complete(&mut self, duration_secs: u64) -> HostEvent {
        let day = match self.active.take() {
            Some(active) => active.day,
            None => unreachable!("completion without an active session"),
        };
        let record = CompletionRecord::new(day, duration_secs, Utc::now());
        info!("Day {} finished in {}s", day, duration_secs);
        HostEvent::Completed(record)
    }

    /// Hand a finished session's record to the progress store
    pub async fn commit(&self, record: CompletionRecord) -> CommitOutcome {
        commit_to(self.store.as_ref(), &record).await
    }
}

impl<S: ProgressStore + ?Sized + 'static> SessionHost<S> {
    /// Commit on a background task so the caller can return to the
    /// dashboard right away. The outcome arrives on the returned channel.
    pub fn spawn_commit(&self, record: CompletionRecord) -> oneshot::Receiver<CommitOutcome> {
        let (tx, rx) = oneshot::channel();
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let outcome = commit_to(store.as_ref(), &record).await;
            let _ = tx.send(outcome);
        });
        rx
    }
}

async fn commit_to<S: ProgressStore + ?Sized>(store: &S, record: &CompletionRecord) -> CommitOutcome {
    match store.append(record).await {
        Ok(AppendOutcome::Synced) => CommitOutcome::Saved,
        Ok(AppendOutcome::Pending { reason }) => {
            warn!("Day {} not synced yet: {}", record.day_number, reason);
            CommitOutcome::Pending { reason }
        }
        Err(e) => {
            error!("Failed to save day {}: {}", record.day_number, e);
            CommitOutcome::Failed { reason: e.to_string() }
        }
    }
}
