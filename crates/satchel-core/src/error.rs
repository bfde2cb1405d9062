//! Error types shared across the satchel crates.
use std::time::Duration;

use thiserror::Error;

use crate::traits::Operation;

/// Failure of a single backend attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport: {0}")] Transport(String),
    #[error("HTTP {status}: {body}")] Status { status: u16, body: String },
    #[error("timed out after {0:?}")] Timeout(Duration),
    #[error("decode: {0}")] Decode(String),
}

/// One failed attempt inside a fallback run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    /// Name of the backend that failed.
    pub provider: String,
    /// What went wrong.
    pub error: ProviderError,
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

/// Every backend in a provider set failed for one operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderSetError {
    #[error(
        "all providers unavailable for {operation} ({} attempted): {}",
        failures.len(),
        summarize(failures)
    )]
    AllProvidersUnavailable {
        operation: Operation,
        failures: Vec<ProviderFailure>,
    },
}

impl ProviderSetError {
    /// The operation that could not be completed.
    pub fn operation(&self) -> Operation {
        match self {
            Self::AllProvidersUnavailable { operation, .. } => *operation,
        }
    }

    /// Per-backend failures, in the order the backends were tried.
    pub fn failures(&self) -> &[ProviderFailure] {
        match self {
            Self::AllProvidersUnavailable { failures, .. } => failures,
        }
    }
}

fn summarize(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no providers configured".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("malformed address: {0}")] Malformed(String),
    #[error("address is not valid for {expected}")] WrongNetwork { expected: String },
}
