use std::collections::BTreeMap;
use std::sync::Mutex;

use thiserror::Error;

use crate::progress::{ApplicationProgress, ProgressId};

/// Failures of the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("progress record not found")]
    NotFound,
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },
}

/// Persistence collaborator for progress records. The coordinator treats
/// it as a black box and never mutates a returned record before the store
/// acknowledged the write.
pub trait ProgressStore {
    fn load(&self, id: ProgressId) -> Result<ApplicationProgress, StoreError>;
    /// Persists a draft snapshot after a start, commit, or cursor move.
    fn save_step(&self, progress: &ApplicationProgress) -> Result<(), StoreError>;
    /// Persists a status transition (submit, review, withdraw).
    fn finalize(&self, progress: &ApplicationProgress) -> Result<(), StoreError>;
}

/// Map-backed store used by the CLI and the test suites.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<ProgressId, ApplicationProgress>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ProgressId, ApplicationProgress>> {
        // A poisoned map is still structurally sound; keep serving.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ProgressStore for MemoryStore {
    fn load(&self, id: ProgressId) -> Result<ApplicationProgress, StoreError> {
        self.lock().get(&id).cloned().ok_or(StoreError::NotFound)
    }

    fn save_step(&self, progress: &ApplicationProgress) -> Result<(), StoreError> {
        self.lock().insert(progress.id, progress.clone());
        Ok(())
    }

    fn finalize(&self, progress: &ApplicationProgress) -> Result<(), StoreError> {
        self.lock().insert(progress.id, progress.clone());
        Ok(())
    }
}

impl<S: ProgressStore + ?Sized> ProgressStore for &S {
    fn load(&self, id: ProgressId) -> Result<ApplicationProgress, StoreError> {
        (**self).load(id)
    }

    fn save_step(&self, progress: &ApplicationProgress) -> Result<(), StoreError> {
        (**self).save_step(progress)
    }

    fn finalize(&self, progress: &ApplicationProgress) -> Result<(), StoreError> {
        (**self).finalize(progress)
    }
}
