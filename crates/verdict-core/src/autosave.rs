//! One-shot persistence of a completed run.
//!
//! The trigger fires at most once per run: when the session is `Completed`
//! with at least one result. A failed save is final for that run. Only an
//! explicit restart resets the trigger.

use serde::Serialize;
use tracing::warn;

use crate::metrics::{Counter, METRICS};
use crate::session::SessionStatus;
use crate::store::{ResultStore, SaveRecord};

/// Persistence state of the current run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum SaveState {
    #[default]
    Idle,
    Saving,
    Saved,
    Error(String),
}

impl SaveState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SaveState::Saved | SaveState::Error(_))
    }
}

/// Remembers whether the current run has already been handed to the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AutoSaveTrigger {
    fired: bool,
}

impl AutoSaveTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether to save now. Returns `true` exactly once per run, and
    /// marks the trigger as fired before returning.
    pub fn observe(&mut self, status: SessionStatus, result_count: usize) -> bool {
        if self.fired || status != SessionStatus::Completed || result_count == 0 {
            return false;
        }
        self.fired = true;
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Arm the trigger for a fresh run.
    pub fn reset(&mut self) {
        self.fired = false;
    }
}

/// Run the save call and map its outcome to the state shown to the user.
pub async fn persist<S: ResultStore + ?Sized>(store: &S, record: &SaveRecord) -> SaveState {
    METRICS.inc(Counter::SavesAttempted);
    match store.save(record).await.and_then(|ack| ack.into_result()) {
        Ok(_) => SaveState::Saved,
        Err(e) => {
            METRICS.inc(Counter::SavesFailed);
            warn!(error = %e, results = record.verification_results.len(), "auto-save failed");
            SaveState::Error(e.to_string())
        }
    }
}
