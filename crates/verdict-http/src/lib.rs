//! Verdict HTTP: network collaborators for verdict-core
//!
//! [`HttpVerificationClient`] implements both `VerificationTransport` (the
//! streaming verify call) and `ResultStore` (the save call), and also
//! exposes the backend's roster, health and perturbation endpoints.

pub mod client;
pub mod config;
pub mod error;
pub mod perturb;

pub use client::HttpVerificationClient;
pub use config::{HttpClientConfig, DEFAULT_SERVER_URL, SERVER_URL_ENV};
pub use error::{HttpError, Result};
pub use perturb::PerturbationInput;
