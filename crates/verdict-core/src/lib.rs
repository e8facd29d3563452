//! Verdict Core Library
//!
//! Client side of a streaming multi-verifier pipeline: decodes a chunked
//! response body, pulls verifier results out of it as soon as each object is
//! complete, tracks them in an epoch-guarded session, summarises agreement
//! and saves each completed run once.

pub mod agreement;
pub mod autosave;
pub mod decode;
pub mod domain;
pub mod extract;
pub mod fakes;
pub mod metrics;
pub mod obs;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod transport;

pub use agreement::{
    snapshot, snapshot_with_roster, AgreementSnapshot, CriterionCell, CriterionMatrix,
    CriterionRow, VerifierColumn,
};
pub use autosave::{persist, AutoSaveTrigger, SaveState};
pub use decode::Utf8ChunkDecoder;
pub use domain::{
    assign_slot, Answers, Criterion, Judgement, Result, SessionError, StoreError,
    TransportError, VerdictError, Verdict, VerificationRequest, VerifierDescriptor,
    VerifierResult, VerifierSlot,
};
pub use extract::{extract_chunks, ExtractionReport, ObjectExtractor};
pub use session::{
    RunOutcome, RunTicket, Session, SessionStatus, StartMode, VerificationController,
};
pub use store::{AckStatus, ResultStore, SaveAck, SaveRecord};
pub use telemetry::init_tracing;
pub use transport::{ChunkStream, ReplayTransport, VerificationTransport};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
