//! Persistence collaborator for finished runs.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{StoreError, VerificationRequest, VerifierResult};

/// Body of the save call: the run's input and its streamed outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub perturbation_data: VerificationRequest,
    pub verification_results: Vec<VerifierResult>,
}

/// `status` field of the backend's save acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Success,
    Error,
}

/// The backend's answer to a save call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveAck {
    pub status: AckStatus,
    #[serde(default)]
    pub message: String,
}

impl SaveAck {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: AckStatus::Success,
            message: message.into(),
        }
    }

    /// Turn an `error` acknowledgement into a [`StoreError::Rejected`].
    pub fn into_result(self) -> Result<SaveAck, StoreError> {
        match self.status {
            AckStatus::Success => Ok(self),
            AckStatus::Error => Err(StoreError::Rejected(self.message)),
        }
    }
}

/// Persists one finished run.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn save(&self, record: &SaveRecord) -> Result<SaveAck, StoreError>;
}

#[async_trait]
impl<S: ResultStore + ?Sized> ResultStore for Arc<S> {
    async fn save(&self, record: &SaveRecord) -> Result<SaveAck, StoreError> {
        (**self).save(record).await
    }
}
