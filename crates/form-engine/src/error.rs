use thiserror::Error;

use form_spec::MalformedTemplate;

use crate::progress::ProgressId;
use crate::store::StoreError;

/// Failures surfaced by the engine. Validation failures are not here:
/// they come back as the `Rejected` step outcome and the caller
/// re-prompts.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    MalformedTemplate(#[from] MalformedTemplate),
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
    #[error("template '{0}' is not accepting applications")]
    TemplateInactive(String),
    #[error("unknown progress record {0}")]
    UnknownProgress(ProgressId),
    #[error("template has no step '{0}'")]
    UnknownStep(String),
    #[error("illegal transition: {reason}")]
    IllegalTransition { reason: String },
    #[error("subject '{subject}' lacks permission '{permission}'")]
    Forbidden { subject: String, permission: String },
    /// The store did not acknowledge; nothing was mutated, retry is safe.
    #[error("persistence unavailable: {reason}")]
    PersistenceUnavailable { reason: String },
}

impl EngineError {
    pub(crate) fn illegal(reason: impl Into<String>) -> Self {
        EngineError::IllegalTransition {
            reason: reason.into(),
        }
    }

    pub(crate) fn from_store(error: StoreError, id: ProgressId) -> Self {
        match error {
            StoreError::NotFound => EngineError::UnknownProgress(id),
            StoreError::Unavailable { reason } => EngineError::PersistenceUnavailable { reason },
        }
    }
}
