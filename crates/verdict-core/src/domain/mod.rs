//! Domain models for the verification pipeline.
//!
//! - `VerificationRequest`: the perturbation under test
//! - `VerifierResult`: one verifier's streamed output
//! - error taxonomy shared by every layer

pub mod error;
mod lenient;
pub mod request;
pub mod result;

pub use error::{Result, SessionError, StoreError, TransportError, VerdictError};
pub use request::{Answers, VerificationRequest};
pub use result::{
    assign_slot, Criterion, Judgement, Verdict, VerifierDescriptor, VerifierResult, VerifierSlot,
};
