use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use form_spec::{AnswerSet, ViolationMap};

pub type ProgressId = Uuid;

/// Lifecycle status of one application record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderReview,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Accepted | ApplicationStatus::Rejected | ApplicationStatus::Withdrawn
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }
}

/// Step pointer of the advancement machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    AtStep(usize),
    Completed,
}

impl Cursor {
    /// Ordering position; `Completed` sits past every step index.
    pub fn position(self) -> usize {
        match self {
            Cursor::AtStep(index) => index,
            Cursor::Completed => usize::MAX,
        }
    }
}

/// Mutable run-time record of one candidate's advancement through a
/// template. Created by `start_application`, transitioned ever after,
/// never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationProgress {
    pub id: ProgressId,
    pub template_id: String,
    pub owner: String,
    pub status: ApplicationStatus,
    pub cursor: Cursor,
    pub answers: AnswerSet,
    /// Violations of the most recent rejected commit, keyed by field id.
    #[serde(default, skip_serializing_if = "ViolationMap::is_empty")]
    pub errors: ViolationMap,
    /// Step ids the cursor has pointed at, in first-visit order.
    pub visited: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_step: Option<String>,
    pub submission_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationProgress {
    /// Fresh draft pointing at the first step.
    pub fn start(template_id: impl Into<String>, owner: impl Into<String>, first_step: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            template_id: template_id.into(),
            owner: owner.into(),
            status: ApplicationStatus::Draft,
            cursor: Cursor::AtStep(0),
            answers: AnswerSet::new(),
            errors: ViolationMap::new(),
            visited: vec![first_step.to_string()],
            last_completed_step: None,
            submission_count: 0,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_visited(&self, step_id: &str) -> bool {
        self.visited.iter().any(|visited| visited == step_id)
    }

    pub fn mark_visited(&mut self, step_id: &str) {
        if !self.has_visited(step_id) {
            self.visited.push(step_id.to_string());
        }
    }
}
