//! Perturbation generation request.

use serde::{Deserialize, Serialize};
use verdict_core::{Answers, VerificationRequest};

/// Body of the perturbation call: a QA instance plus the requested class
/// and intensity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerturbationInput {
    pub question: String,
    pub context: String,
    pub answers: Vec<String>,
    pub perturbation_class: String,
    pub intensity: String,
}

impl PerturbationInput {
    /// Every field the backend requires is present.
    pub fn is_complete(&self) -> bool {
        !self.question.trim().is_empty()
            && !self.context.trim().is_empty()
            && self.answers.iter().any(|a| !a.trim().is_empty())
    }

    /// Fill the parts of a generated request that echo this input, when the
    /// generator left them out.
    pub fn complete(&self, mut request: VerificationRequest) -> VerificationRequest {
        if request.original_query.is_empty() {
            request.original_query = self.question.clone();
        }
        if request.original_context.is_empty() {
            request.original_context = self.context.clone();
        }
        if request.original_answers.is_empty() {
            request.original_answers = Answers::List(self.answers.clone());
        }
        if request.perturbation_class.is_empty() {
            request.perturbation_class = self.perturbation_class.clone();
        }
        if request.intensity.is_empty() {
            request.intensity = self.intensity.clone();
        }
        request
    }
}
