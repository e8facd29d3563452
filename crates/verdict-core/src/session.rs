//! Verification session controller.
//!
//! A [`VerificationController`] owns one [`Session`] for one request. Each
//! run is identified by an epoch: starting a run bumps the epoch, and every
//! mutation issued by a run's streaming loop is checked against it, so a
//! loop that was abandoned can never write into a newer run.
//!
//! The internal lock is never held across an await point. Observers get the
//! latest session through a `tokio::sync::watch` channel.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::agreement::{snapshot_with_roster, AgreementSnapshot};
use crate::autosave::{self, AutoSaveTrigger, SaveState};
use crate::decode::Utf8ChunkDecoder;
use crate::domain::{
    assign_slot, SessionError, VerificationRequest, VerifierDescriptor, VerifierResult,
};
use crate::extract::ObjectExtractor;
use crate::metrics::{Counter, METRICS};
use crate::obs;
use crate::store::{ResultStore, SaveRecord};
use crate::transport::VerificationTransport;

/// Lifecycle of the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Streaming,
    Completed,
    Failed,
}

/// Everything an observer can see about the current run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Session {
    pub run_id: Option<Uuid>,
    pub epoch: u64,
    pub status: SessionStatus,
    /// Arrival order; never reordered or deduplicated.
    pub results: Vec<VerifierResult>,
    pub error: Option<String>,
    pub save: SaveState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Who asked for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Start-up path. Ignored once any run has started.
    Auto,
    /// Explicit restart by the user.
    Manual,
}

/// Proof that a run was started. Handed to [`VerificationController::drive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTicket {
    epoch: u64,
    run_id: Uuid,
}

impl RunTicket {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }
}

/// How a driven run ended, from the driver's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { results: usize },
    Failed { message: String },
    /// A newer run took over before this one finished.
    Superseded,
}

#[derive(Debug, Default)]
struct Inner {
    session: Session,
    autosave: AutoSaveTrigger,
    started_once: bool,
}

impl Inner {
    fn is_current(&self, ticket: &RunTicket) -> bool {
        self.session.epoch == ticket.epoch && self.session.status == SessionStatus::Streaming
    }

    fn elapsed_ms(&self) -> i64 {
        match (self.session.started_at, self.session.finished_at) {
            (Some(start), Some(end)) => (end - start).num_milliseconds(),
            _ => 0,
        }
    }
}

/// Drives verification runs for one request and keeps the session state.
pub struct VerificationController<T, S> {
    transport: T,
    store: S,
    request: VerificationRequest,
    roster: Vec<VerifierDescriptor>,
    inner: Mutex<Inner>,
    updates: watch::Sender<Session>,
}

impl<T, S> VerificationController<T, S>
where
    T: VerificationTransport,
    S: ResultStore,
{
    pub fn new(transport: T, store: S, request: VerificationRequest) -> Self {
        let (updates, _) = watch::channel(Session::default());
        Self {
            transport,
            store,
            request,
            roster: Vec::new(),
            inner: Mutex::new(Inner::default()),
            updates,
        }
    }

    /// Configured verifiers. Used to give results stable slots and to show
    /// pending columns before a verifier reports.
    pub fn with_roster(mut self, roster: Vec<VerifierDescriptor>) -> Self {
        self.roster = roster;
        self
    }

    pub fn request(&self) -> &VerificationRequest {
        &self.request
    }

    pub fn roster(&self) -> &[VerifierDescriptor] {
        &self.roster
    }

    /// Receiver that always holds the latest session.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    /// Agreement over the results received so far.
    pub fn agreement(&self) -> AgreementSnapshot {
        snapshot_with_roster(&self.lock().session.results, &self.roster)
    }

    /// Start a new run.
    ///
    /// `Auto` returns `Ok(None)` once any run has been started, so repeated
    /// start-up triggers never open a second call. `Manual` is refused while
    /// a run is streaming; call [`abandon`](Self::abandon) first.
    pub fn begin(&self, mode: StartMode) -> Result<Option<RunTicket>, SessionError> {
        let ticket = self.update(|inner| {
            if mode == StartMode::Auto && inner.started_once {
                return Ok(None);
            }
            if inner.session.status == SessionStatus::Streaming {
                return Err(SessionError::AlreadyStreaming);
            }

            inner.started_once = true;
            inner.autosave.reset();

            let run_id = Uuid::new_v4();
            let session = &mut inner.session;
            session.epoch += 1;
            session.run_id = Some(run_id);
            session.status = SessionStatus::Streaming;
            session.results.clear();
            session.error = None;
            session.save = SaveState::Idle;
            session.started_at = Some(Utc::now());
            session.finished_at = None;

            Ok(Some(RunTicket {
                epoch: session.epoch,
                run_id,
            }))
        })?;

        if let Some(ticket) = &ticket {
            METRICS.inc(Counter::RunsStarted);
            obs::emit_run_started(&ticket.run_id, ticket.epoch, &self.request.label());
        }
        Ok(ticket)
    }

    /// Detach the streaming run, if any. Its loop keeps reading until it
    /// notices, but nothing it produces is applied. Returns whether a run
    /// was abandoned.
    pub fn abandon(&self) -> bool {
        self.update(|inner| {
            if inner.session.status != SessionStatus::Streaming {
                return false;
            }
            inner.session.epoch += 1;
            inner.session.status = SessionStatus::Idle;
            inner.session.finished_at = Some(Utc::now());
            debug!(epoch = inner.session.epoch, "streaming run abandoned");
            true
        })
    }

    /// Run the streaming loop for `ticket` to the end, then settle the
    /// auto-save.
    pub async fn drive(&self, ticket: RunTicket) -> RunOutcome {
        let span = obs::run_span(&ticket.run_id, ticket.epoch);
        self.stream_run(ticket).instrument(span).await
    }

    /// Start-up entry point. Starts and drives a run only the first time.
    pub async fn auto_start(&self) -> Option<RunOutcome> {
        match self.begin(StartMode::Auto) {
            Ok(Some(ticket)) => Some(self.drive(ticket).await),
            _ => None,
        }
    }

    /// Clear the session and run again. Refused while a run is streaming.
    pub async fn restart(&self) -> Result<RunOutcome, SessionError> {
        match self.begin(StartMode::Manual)? {
            Some(ticket) => Ok(self.drive(ticket).await),
            None => Ok(RunOutcome::Superseded),
        }
    }

    /// Save the current run if it just completed with results and has not
    /// been saved yet. Safe to call any number of times; only the first
    /// eligible call reaches the store.
    ///
    /// Returns the save outcome when this call performed the save.
    pub async fn settle(&self) -> Option<SaveState> {
        let (epoch, run_id, record) = {
            let mut guard = self.lock();
            let inner = &mut *guard;
            if !inner
                .autosave
                .observe(inner.session.status, inner.session.results.len())
            {
                return None;
            }
            inner.session.save = SaveState::Saving;
            let record = SaveRecord {
                perturbation_data: self.request.clone(),
                verification_results: inner.session.results.clone(),
            };
            self.updates.send_replace(inner.session.clone());
            (
                inner.session.epoch,
                inner.session.run_id.unwrap_or_default(),
                record,
            )
        };

        let state = autosave::persist(&self.store, &record).await;
        obs::emit_save_finished(&run_id, &state);

        self.update(|inner| {
            if inner.session.epoch == epoch {
                inner.session.save = state.clone();
            } else {
                debug!(
                    save_epoch = epoch,
                    current_epoch = inner.session.epoch,
                    "save finished for a superseded run"
                );
            }
        });
        Some(state)
    }

    async fn stream_run(&self, ticket: RunTicket) -> RunOutcome {
        let mut stream = match self.transport.open(&self.request).await {
            Ok(stream) => stream,
            Err(e) => return self.fail(&ticket, e.to_string()),
        };

        let mut decoder = Utf8ChunkDecoder::new();
        let mut extractor = ObjectExtractor::<VerifierResult>::new();

        while let Some(chunk) = stream.next().await {
            if !self.is_current(&ticket) {
                return self.drop_stale(&ticket);
            }
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => return self.fail(&ticket, e.to_string()),
            };
            for result in extractor.feed(&decoder.decode(&bytes)) {
                if !self.append(&ticket, result) {
                    return RunOutcome::Superseded;
                }
            }
        }

        for result in extractor.feed(&decoder.finish()) {
            if !self.append(&ticket, result) {
                return RunOutcome::Superseded;
            }
        }
        extractor.finish();

        let Some(results) = self.complete(&ticket) else {
            return RunOutcome::Superseded;
        };
        self.settle().await;
        METRICS.flush();
        RunOutcome::Completed { results }
    }

    fn is_current(&self, ticket: &RunTicket) -> bool {
        self.lock().is_current(ticket)
    }

    /// Append one result if `ticket` is still the current run.
    fn append(&self, ticket: &RunTicket, result: VerifierResult) -> bool {
        let appended = self.update(|inner| {
            if !inner.is_current(ticket) {
                return false;
            }
            let seq = inner.session.results.len();
            let slot = assign_slot(&self.roster, &result, seq);
            let result = result.with_slot(slot);
            obs::emit_result_appended(
                &ticket.run_id,
                seq,
                &result.verification_model,
                result.verdict(),
            );
            inner.session.results.push(result);
            true
        });
        if !appended {
            self.drop_stale(ticket);
        }
        appended
    }

    fn drop_stale(&self, ticket: &RunTicket) -> RunOutcome {
        let current = self.lock().session.epoch;
        METRICS.inc(Counter::StaleResultsDropped);
        obs::emit_stale_result_dropped(ticket.epoch, current);
        RunOutcome::Superseded
    }

    fn complete(&self, ticket: &RunTicket) -> Option<usize> {
        self.update(|inner| {
            if !inner.is_current(ticket) {
                return None;
            }
            inner.session.status = SessionStatus::Completed;
            inner.session.finished_at = Some(Utc::now());
            let results = inner.session.results.len();
            obs::emit_run_finished(&ticket.run_id, results, inner.elapsed_ms());
            Some(results)
        })
    }

    fn fail(&self, ticket: &RunTicket, message: String) -> RunOutcome {
        let applied = self.update(|inner| {
            if !inner.is_current(ticket) {
                return false;
            }
            inner.session.status = SessionStatus::Failed;
            inner.session.error = Some(message.clone());
            inner.session.finished_at = Some(Utc::now());
            obs::emit_run_failed(&ticket.run_id, &message, inner.session.results.len());
            true
        });
        if applied {
            RunOutcome::Failed { message }
        } else {
            RunOutcome::Superseded
        }
    }

    /// Apply `f` under the lock and publish the resulting session.
    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.lock();
        let out = f(&mut inner);
        self.updates.send_replace(inner.session.clone());
        out
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{ChannelTransport, MemoryResultStore};
    use crate::transport::ReplayTransport;

    fn controller(body: &str) -> VerificationController<ReplayTransport, MemoryResultStore> {
        VerificationController::new(
            ReplayTransport::new(body.to_string(), 7),
            MemoryResultStore::new(),
            VerificationRequest::default(),
        )
    }

    #[tokio::test]
    async fn replayed_run_completes_and_saves() {
        let body = r#"[{"verification_model":"a","verification_response":{"verification_result":"PASS"}},
                       {"verification_model":"b","verification_response":{"verification_result":"FAIL"}}]"#;
        let ctl = controller(body);

        let outcome = ctl.auto_start().await;
        assert_eq!(outcome, Some(RunOutcome::Completed { results: 2 }));

        let session = ctl.snapshot();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.save, SaveState::Saved);
        assert!(session.finished_at.is_some());
        assert_eq!(session.results[1].slot.index, 1);
        assert_eq!(ctl.agreement().agreement_rate, Some(50));
    }

    #[tokio::test]
    async fn auto_start_runs_only_once() {
        let ctl = controller("[]");
        assert!(ctl.auto_start().await.is_some());
        assert!(ctl.auto_start().await.is_none());
        assert_eq!(ctl.begin(StartMode::Auto), Ok(None));
    }

    #[tokio::test]
    async fn empty_completion_is_not_saved() {
        let ctl = controller("[]");
        assert_eq!(
            ctl.auto_start().await,
            Some(RunOutcome::Completed { results: 0 })
        );
        assert_eq!(ctl.snapshot().save, SaveState::Idle);
        assert!(ctl.settle().await.is_none());
    }

    #[tokio::test]
    async fn manual_begin_is_refused_while_streaming() {
        let transport = ChannelTransport::new();
        let _feed = transport.prepare();
        let ctl = VerificationController::new(
            transport,
            MemoryResultStore::new(),
            VerificationRequest::default(),
        );

        let ticket = ctl.begin(StartMode::Manual).unwrap().unwrap();
        assert_eq!(ticket.epoch(), 1);
        assert_eq!(
            ctl.begin(StartMode::Manual),
            Err(SessionError::AlreadyStreaming)
        );
        assert!(ctl.abandon());
        assert!(!ctl.abandon());
        assert_eq!(ctl.snapshot().epoch, 2);
    }

    #[tokio::test]
    async fn subscribers_see_status_changes() {
        let ctl = controller("[]");
        let rx = ctl.subscribe();
        ctl.auto_start().await;
        assert_eq!(rx.borrow().status, SessionStatus::Completed);
        assert!(rx.borrow().run_id.is_some());
    }
}
