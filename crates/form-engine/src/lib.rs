#![allow(missing_docs)]

pub mod access;
pub mod coordinator;
pub mod error;
pub mod machine;
pub mod progress;
pub mod store;

pub use access::{AllowAll, PermissionCheck, RoleGrants, UPDATE_ALL, UPDATE_OWN};
pub use coordinator::{ReviewDecision, StepCommit, SubmissionCoordinator};
pub use error::EngineError;
pub use machine::{StepMachine, StepOutcome};
pub use progress::{ApplicationProgress, ApplicationStatus, Cursor, ProgressId};
pub use store::{MemoryStore, ProgressStore, StoreError};
