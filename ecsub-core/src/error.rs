//! Error types for the core model

use thiserror::Error;

use crate::domain::state::JobState;

/// Errors raised while turning a submission config into a descriptor
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required field was left empty
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    /// A field holds a value outside its valid range
    #[error("invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Rejected job state transition
#[derive(Debug, Error, PartialEq, Eq)]
#[error("job {index}: invalid transition {from} -> {to}")]
pub struct TransitionError {
    pub index: usize,
    pub from: JobState,
    pub to: JobState,
}
