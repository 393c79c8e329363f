use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use form_spec::{AnswerSet, FormTemplate, visible_steps};

use crate::access::{PermissionCheck, UPDATE_ALL, UPDATE_OWN};
use crate::error::EngineError;
use crate::machine::{StepMachine, StepOutcome};
use crate::progress::{ApplicationProgress, ApplicationStatus, Cursor, ProgressId};
use crate::store::ProgressStore;

/// Snapshot returned by `commit_step`: the persisted record plus what the
/// commit did.
#[derive(Debug, Clone, Serialize)]
pub struct StepCommit {
    pub progress: ApplicationProgress,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Reviewer verdict over a submitted application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Accept,
    Reject,
}

/// Orchestrates the application lifecycle against the persistence and
/// permission collaborators.
///
/// Access to one progress record is serialized with a per-record lock;
/// distinct records never contend. A record is mutated only on a working
/// copy and returned only after the store acknowledged the write, so a
/// persistence failure leaves the stored state untouched and the call
/// safe to retry.
pub struct SubmissionCoordinator<S, P> {
    machines: BTreeMap<String, StepMachine>,
    store: S,
    permissions: P,
    locks: Mutex<BTreeMap<ProgressId, Arc<Mutex<()>>>>,
}

impl<S: ProgressStore, P: PermissionCheck> SubmissionCoordinator<S, P> {
    pub fn new(store: S, permissions: P) -> Self {
        Self {
            machines: BTreeMap::new(),
            store,
            permissions,
            locks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Admits a template into the registry after the integrity gate.
    pub fn register(&mut self, template: FormTemplate) -> Result<(), EngineError> {
        let machine = StepMachine::new(template)?;
        debug!(template = %machine.template().id, "template registered");
        self.machines
            .insert(machine.template().id.clone(), machine);
        Ok(())
    }

    pub fn template(&self, template_id: &str) -> Option<&FormTemplate> {
        self.machines
            .get(template_id)
            .map(|machine| machine.template())
    }

    /// Opens a fresh draft for `subject` and persists it before returning.
    pub fn start_application(
        &self,
        template_id: &str,
        subject: &str,
    ) -> Result<ApplicationProgress, EngineError> {
        let machine = self.machine_for(template_id)?;
        if !machine.template().is_active {
            return Err(EngineError::TemplateInactive(template_id.to_string()));
        }
        let progress = ApplicationProgress::start(template_id, subject, &machine.first_step().id);
        self.store
            .save_step(&progress)
            .map_err(|error| EngineError::from_store(error, progress.id))?;
        info!(progress = %progress.id, template = template_id, owner = subject, "application started");
        Ok(progress)
    }

    /// Commits raw answers for one step.
    ///
    /// Replaying a commit whose content is already stored echoes the
    /// stored record without another write and without moving anything.
    pub fn commit_step(
        &self,
        id: ProgressId,
        step_id: &str,
        incoming: &AnswerSet,
    ) -> Result<StepCommit, EngineError> {
        let lock = self.record_lock(id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let stored = self.load(id)?;
        let machine = self.machine_for(&stored.template_id)?;

        if let Some(outcome) = replay_outcome(machine, &stored, step_id, incoming)? {
            debug!(progress = %id, step = step_id, "step commit replayed");
            return Ok(StepCommit {
                progress: stored,
                outcome,
            });
        }

        let mut working = stored.clone();
        let outcome = machine.submit_step(&mut working, step_id, incoming)?;
        if working == stored {
            debug!(progress = %id, step = step_id, "step commit changed nothing");
            return Ok(StepCommit {
                progress: working,
                outcome,
            });
        }
        working.updated_at = Utc::now();
        if let Err(error) = self.store.save_step(&working) {
            warn!(progress = %id, step = step_id, error = %error, "step persist failed");
            return Err(EngineError::from_store(error, id));
        }
        debug!(progress = %id, step = step_id, accepted = !matches!(outcome, StepOutcome::Rejected { .. }), "step committed");
        Ok(StepCommit {
            progress: working,
            outcome,
        })
    }

    /// Moves the cursor back to an earlier visited step and persists the
    /// move.
    pub fn go_back(
        &self,
        id: ProgressId,
        step_id: &str,
    ) -> Result<ApplicationProgress, EngineError> {
        let lock = self.record_lock(id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let stored = self.load(id)?;
        let machine = self.machine_for(&stored.template_id)?;

        let mut working = stored;
        machine.go_back(&mut working, step_id)?;
        working.updated_at = Utc::now();
        if let Err(error) = self.store.save_step(&working) {
            warn!(progress = %id, step = step_id, error = %error, "cursor persist failed");
            return Err(EngineError::from_store(error, id));
        }
        debug!(progress = %id, step = step_id, "cursor moved back");
        Ok(working)
    }

    /// Submits a completed draft on behalf of `subject`.
    ///
    /// Idempotent for client retries: finalizing an already submitted
    /// record echoes it unchanged. Statuses past `submitted` refuse.
    pub fn finalize(
        &self,
        id: ProgressId,
        subject: &str,
    ) -> Result<ApplicationProgress, EngineError> {
        let lock = self.record_lock(id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let stored = self.load(id)?;
        self.require_owner_aware(subject, &stored)?;

        match stored.status {
            ApplicationStatus::Submitted => {
                info!(progress = %id, "finalize replayed");
                return Ok(stored);
            }
            ApplicationStatus::Draft => {}
            other => {
                return Err(EngineError::illegal(format!(
                    "cannot finalize from status {}",
                    other.as_str()
                )));
            }
        }
        if stored.cursor != Cursor::Completed {
            return Err(EngineError::illegal(
                "every visible step must be committed before finalize",
            ));
        }

        let mut working = stored;
        let now = Utc::now();
        working.completed_at = Some(now);
        working.submission_count += 1;
        let working = self.persist_transition(working, ApplicationStatus::Submitted)?;
        info!(
            progress = %id,
            owner = %working.owner,
            submissions = working.submission_count,
            "application submitted"
        );
        Ok(working)
    }

    /// Takes a submitted application into review. Reviewer-only.
    pub fn begin_review(
        &self,
        id: ProgressId,
        subject: &str,
    ) -> Result<ApplicationProgress, EngineError> {
        let lock = self.record_lock(id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let stored = self.load(id)?;
        self.require(subject, UPDATE_ALL)?;
        if stored.status != ApplicationStatus::Submitted {
            return Err(EngineError::illegal(format!(
                "review starts from submitted, found {}",
                stored.status.as_str()
            )));
        }
        self.persist_transition(stored, ApplicationStatus::UnderReview)
    }

    /// Settles an application under review. Reviewer-only.
    pub fn decide(
        &self,
        id: ProgressId,
        subject: &str,
        decision: ReviewDecision,
    ) -> Result<ApplicationProgress, EngineError> {
        let lock = self.record_lock(id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let stored = self.load(id)?;
        self.require(subject, UPDATE_ALL)?;
        if stored.status != ApplicationStatus::UnderReview {
            return Err(EngineError::illegal(format!(
                "decision requires under_review, found {}",
                stored.status.as_str()
            )));
        }
        let status = match decision {
            ReviewDecision::Accept => ApplicationStatus::Accepted,
            ReviewDecision::Reject => ApplicationStatus::Rejected,
        };
        self.persist_transition(stored, status)
    }

    /// Withdraws a non-terminal application.
    pub fn withdraw(
        &self,
        id: ProgressId,
        subject: &str,
    ) -> Result<ApplicationProgress, EngineError> {
        let lock = self.record_lock(id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let stored = self.load(id)?;
        self.require_owner_aware(subject, &stored)?;
        if stored.status.is_terminal() {
            return Err(EngineError::illegal(format!(
                "cannot withdraw from terminal status {}",
                stored.status.as_str()
            )));
        }
        self.persist_transition(stored, ApplicationStatus::Withdrawn)
    }

    fn persist_transition(
        &self,
        mut working: ApplicationProgress,
        status: ApplicationStatus,
    ) -> Result<ApplicationProgress, EngineError> {
        let id = working.id;
        working.status = status;
        working.updated_at = Utc::now();
        if let Err(error) = self.store.finalize(&working) {
            warn!(progress = %id, status = status.as_str(), error = %error, "status persist failed");
            return Err(EngineError::from_store(error, id));
        }
        info!(progress = %id, status = status.as_str(), "status transition persisted");
        Ok(working)
    }

    /// Owners need `applications.update_own`, everyone else
    /// `applications.update_all`.
    fn require_owner_aware(
        &self,
        subject: &str,
        progress: &ApplicationProgress,
    ) -> Result<(), EngineError> {
        let permission = if subject == progress.owner {
            UPDATE_OWN
        } else {
            UPDATE_ALL
        };
        self.require(subject, permission)
    }

    fn require(&self, subject: &str, permission: &'static str) -> Result<(), EngineError> {
        if self.permissions.has_permission(subject, permission) {
            return Ok(());
        }
        Err(EngineError::Forbidden {
            subject: subject.to_string(),
            permission: permission.to_string(),
        })
    }

    fn machine_for(&self, template_id: &str) -> Result<&StepMachine, EngineError> {
        self.machines
            .get(template_id)
            .ok_or_else(|| EngineError::UnknownTemplate(template_id.to_string()))
    }

    fn load(&self, id: ProgressId) -> Result<ApplicationProgress, EngineError> {
        self.store
            .load(id)
            .map_err(|error| EngineError::from_store(error, id))
    }

    fn record_lock(&self, id: ProgressId) -> Arc<Mutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(id).or_default().clone()
    }
}

/// A commit counts as a replay when the cursor already moved past the
/// step and every incoming pair is stored verbatim. The echoed outcome is
/// recomputed from the stored answers, which the replay by definition did
/// not change. Divergent answers for a committed step are refused; the
/// caller must go back first.
fn replay_outcome(
    machine: &StepMachine,
    stored: &ApplicationProgress,
    step_id: &str,
    incoming: &AnswerSet,
) -> Result<Option<StepOutcome>, EngineError> {
    if stored.status != ApplicationStatus::Draft {
        return Ok(None);
    }
    let Some(step) = machine.template().step(step_id) else {
        return Ok(None);
    };
    let position = step.order as usize;
    if stored.cursor.position() <= position {
        return Ok(None);
    }
    let already_stored = incoming
        .iter()
        .all(|(field, value)| stored.answers.get(field) == Some(value));
    if !already_stored {
        return Err(EngineError::illegal(format!(
            "step '{step_id}' was already committed with different answers"
        )));
    }
    let next = visible_steps(machine.template(), &stored.answers)
        .into_iter()
        .find(|later| (later.order as usize) > position);
    Ok(Some(match next {
        Some(next) => StepOutcome::Advanced {
            next_step: next.id.clone(),
        },
        None => StepOutcome::Completed,
    }))
}
