//! Structured observability hooks for the verification run lifecycle.
//!
//! Provides a run-scoped span (attach it with `tracing::Instrument` so it
//! survives suspension points) and one emitter per lifecycle event. Events
//! go out at `info!` except drops and failures, which warn.

use tracing::{info, warn};
use uuid::Uuid;

use crate::autosave::SaveState;
use crate::domain::Verdict;

/// Span tagged with the run id and epoch. Everything logged while a run is
/// driven is nested under it.
pub fn run_span(run_id: &Uuid, epoch: u64) -> tracing::Span {
    tracing::info_span!("verdict.run", run_id = %run_id, epoch = epoch)
}

pub fn emit_run_started(run_id: &Uuid, epoch: u64, request_label: &str) {
    info!(event = "run.started", run_id = %run_id, epoch = epoch, request = %request_label);
}

pub fn emit_result_appended(run_id: &Uuid, seq: usize, model: &str, verdict: Verdict) {
    info!(
        event = "run.result_appended",
        run_id = %run_id,
        seq = seq,
        model = %model,
        verdict = %verdict,
    );
}

pub fn emit_run_finished(run_id: &Uuid, results: usize, duration_ms: i64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        results = results,
        duration_ms = duration_ms,
    );
}

pub fn emit_run_failed(run_id: &Uuid, error: &str, results_so_far: usize) {
    warn!(
        event = "run.failed",
        run_id = %run_id,
        error = %error,
        results_so_far = results_so_far,
    );
}

/// A result from an abandoned run arrived after a newer run started.
pub fn emit_stale_result_dropped(stale_epoch: u64, current_epoch: u64) {
    warn!(
        event = "run.stale_result_dropped",
        stale_epoch = stale_epoch,
        current_epoch = current_epoch,
    );
}

pub fn emit_save_finished(run_id: &Uuid, state: &SaveState) {
    match state {
        SaveState::Error(message) => {
            warn!(event = "save.finished", run_id = %run_id, success = false, error = %message)
        }
        _ => info!(event = "save.finished", run_id = %run_id, success = true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_and_emitters_do_not_panic_without_subscriber() {
        let id = Uuid::new_v4();
        let _entered = run_span(&id, 3).entered();
        emit_run_started(&id, 3, "P-Ambiguity / HIGH");
        emit_result_appended(&id, 0, "m1", Verdict::Pass);
        emit_save_finished(&id, &SaveState::Error("boom".into()));
    }
}
