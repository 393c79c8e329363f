use serde_json::json;

use form_engine::{
    AllowAll, ApplicationStatus, Cursor, EngineError, MemoryStore, ProgressStore, ReviewDecision,
    RoleGrants, StepOutcome, SubmissionCoordinator,
};
use form_spec::{
    AnswerSet, Condition, ConditionOperator, Field, FieldType, FormTemplate, Step, ValidationRule,
};

fn make_field(id: &str, order: u32) -> Field {
    Field {
        id: id.into(),
        kind: FieldType::Text,
        label: id.into(),
        description: None,
        required: false,
        options: None,
        validation: ValidationRule::default(),
        order,
        conditions: vec![],
    }
}

fn make_step(id: &str, order: u32, fields: Vec<Field>) -> Step {
    Step {
        id: id.into(),
        title: id.into(),
        description: None,
        fields,
        order,
        conditions: vec![],
    }
}

/// Step a asks `interested`; step b requires the answer to be yes.
fn make_interest_template() -> FormTemplate {
    let mut interested = make_field("interested", 0);
    interested.required = true;
    let step_a = make_step("a", 0, vec![interested]);
    let mut step_b = make_step("b", 1, vec![make_field("details", 0)]);
    step_b.conditions = vec![Condition {
        field: "interested".into(),
        operator: ConditionOperator::Equals,
        value: json!("yes"),
    }];
    FormTemplate {
        id: "apply".into(),
        title: "Apply".into(),
        description: None,
        is_active: true,
        steps: vec![step_a, step_b],
        meta: Default::default(),
    }
}

fn make_coordinator() -> SubmissionCoordinator<MemoryStore, AllowAll> {
    let mut coordinator = SubmissionCoordinator::new(MemoryStore::new(), AllowAll);
    coordinator
        .register(make_interest_template())
        .expect("template is well formed");
    coordinator
}

fn answers(pairs: &[(&str, serde_json::Value)]) -> AnswerSet {
    pairs
        .iter()
        .map(|(field, value)| (field.to_string(), value.clone()))
        .collect()
}

#[test]
fn full_walk_commits_both_steps_and_submits() {
    let coordinator = make_coordinator();
    let progress = coordinator
        .start_application("apply", "alice")
        .expect("active template");
    assert_eq!(progress.status, ApplicationStatus::Draft);
    assert_eq!(progress.cursor, Cursor::AtStep(0));
    assert!(progress.answers.is_empty());

    let commit = coordinator
        .commit_step(progress.id, "a", &answers(&[("interested", json!("yes"))]))
        .expect("valid commit");
    assert_eq!(
        commit.outcome,
        StepOutcome::Advanced {
            next_step: "b".into(),
        }
    );

    let commit = coordinator
        .commit_step(progress.id, "b", &answers(&[("details", json!("rustacean"))]))
        .expect("valid commit");
    assert_eq!(commit.outcome, StepOutcome::Completed);
    assert_eq!(commit.progress.cursor, Cursor::Completed);

    let submitted = coordinator
        .finalize(progress.id, "alice")
        .expect("complete draft");
    assert_eq!(submitted.status, ApplicationStatus::Submitted);
    assert_eq!(submitted.submission_count, 1);
    assert!(submitted.completed_at.is_some());
}

#[test]
fn uninterested_walk_finishes_after_one_step() {
    let coordinator = make_coordinator();
    let progress = coordinator.start_application("apply", "alice").expect("start");

    let commit = coordinator
        .commit_step(progress.id, "a", &answers(&[("interested", json!("no"))]))
        .expect("valid commit");
    assert_eq!(commit.outcome, StepOutcome::Completed);

    let submitted = coordinator.finalize(progress.id, "alice").expect("complete");
    assert_eq!(submitted.status, ApplicationStatus::Submitted);
}

#[test]
fn rejected_commit_persists_attempt_and_violations() {
    let store = MemoryStore::new();
    let mut coordinator = SubmissionCoordinator::new(&store, AllowAll);
    coordinator.register(make_interest_template()).expect("register");

    let progress = coordinator.start_application("apply", "alice").expect("start");
    let commit = coordinator
        .commit_step(progress.id, "a", &answers(&[("interested", json!(""))]))
        .expect("call is legal, content is not");
    let StepOutcome::Rejected { violations } = &commit.outcome else {
        panic!("expected rejection");
    };
    assert!(violations.contains_key("interested"));
    assert_eq!(commit.progress.cursor, Cursor::AtStep(0));

    let stored = store.load(progress.id).expect("persisted");
    assert_eq!(stored.answers.get("interested"), Some(&json!("")));
    assert!(stored.errors.contains_key("interested"));

    let error = coordinator.finalize(progress.id, "alice").unwrap_err();
    assert!(matches!(error, EngineError::IllegalTransition { .. }));
}

#[test]
fn inactive_template_refuses_applications() {
    let mut template = make_interest_template();
    template.is_active = false;
    let mut coordinator = SubmissionCoordinator::new(MemoryStore::new(), AllowAll);
    coordinator.register(template).expect("register");

    let error = coordinator.start_application("apply", "alice").unwrap_err();
    assert!(matches!(error, EngineError::TemplateInactive(_)));
}

#[test]
fn unknown_template_and_progress_are_named_errors() {
    let coordinator = make_coordinator();
    assert!(matches!(
        coordinator.start_application("ghost", "alice").unwrap_err(),
        EngineError::UnknownTemplate(_)
    ));
    assert!(matches!(
        coordinator
            .commit_step(uuid::Uuid::new_v4(), "a", &AnswerSet::new())
            .unwrap_err(),
        EngineError::UnknownProgress(_)
    ));
}

#[test]
fn go_back_persists_the_cursor_move() {
    let store = MemoryStore::new();
    let mut coordinator = SubmissionCoordinator::new(&store, AllowAll);
    coordinator.register(make_interest_template()).expect("register");

    let progress = coordinator.start_application("apply", "alice").expect("start");
    coordinator
        .commit_step(progress.id, "a", &answers(&[("interested", json!("yes"))]))
        .expect("commit");

    let moved = coordinator.go_back(progress.id, "a").expect("visited");
    assert_eq!(moved.cursor, Cursor::AtStep(0));
    assert_eq!(store.load(progress.id).expect("stored").cursor, Cursor::AtStep(0));

    // Changing the gate answer reroutes straight past step b.
    let commit = coordinator
        .commit_step(progress.id, "a", &answers(&[("interested", json!("no"))]))
        .expect("commit");
    assert_eq!(commit.outcome, StepOutcome::Completed);
}

fn make_review_coordinator(
    store: &MemoryStore,
) -> SubmissionCoordinator<&MemoryStore, RoleGrants> {
    let grants = RoleGrants::new()
        .role("candidate", &["applications.update_own"], &[])
        .expect("pattern")
        .role("reviewer", &["applications.*"], &[])
        .expect("pattern")
        .assign("alice", "candidate")
        .assign("harper", "reviewer");
    let mut coordinator = SubmissionCoordinator::new(store, grants);
    coordinator.register(make_interest_template()).expect("register");
    coordinator
}

fn submit_one(
    coordinator: &SubmissionCoordinator<&MemoryStore, RoleGrants>,
) -> form_engine::ProgressId {
    let progress = coordinator.start_application("apply", "alice").expect("start");
    coordinator
        .commit_step(progress.id, "a", &answers(&[("interested", json!("no"))]))
        .expect("commit");
    coordinator.finalize(progress.id, "alice").expect("submit");
    progress.id
}

#[test]
fn review_flow_walks_submitted_to_accepted() {
    let store = MemoryStore::new();
    let coordinator = make_review_coordinator(&store);
    let id = submit_one(&coordinator);

    let reviewing = coordinator.begin_review(id, "harper").expect("reviewer");
    assert_eq!(reviewing.status, ApplicationStatus::UnderReview);

    let decided = coordinator
        .decide(id, "harper", ReviewDecision::Accept)
        .expect("reviewer");
    assert_eq!(decided.status, ApplicationStatus::Accepted);

    // Terminal records refuse further movement.
    assert!(coordinator.withdraw(id, "alice").is_err());
    assert!(coordinator
        .decide(id, "harper", ReviewDecision::Reject)
        .is_err());
}

#[test]
fn candidates_cannot_review_and_strangers_cannot_finalize() {
    let store = MemoryStore::new();
    let coordinator = make_review_coordinator(&store);
    let id = submit_one(&coordinator);

    let error = coordinator.begin_review(id, "alice").unwrap_err();
    assert!(matches!(error, EngineError::Forbidden { .. }));

    let progress = coordinator.start_application("apply", "alice").expect("start");
    coordinator
        .commit_step(progress.id, "a", &answers(&[("interested", json!("no"))]))
        .expect("commit");
    let error = coordinator.finalize(progress.id, "mallory").unwrap_err();
    assert!(matches!(error, EngineError::Forbidden { .. }));

    // A reviewer may finalize on the candidate's behalf.
    let finalized = coordinator.finalize(progress.id, "harper").expect("update_all");
    assert_eq!(finalized.status, ApplicationStatus::Submitted);
}

#[test]
fn withdraw_is_open_until_terminal() {
    let store = MemoryStore::new();
    let coordinator = make_review_coordinator(&store);

    // Draft withdrawal by the owner.
    let progress = coordinator.start_application("apply", "alice").expect("start");
    let withdrawn = coordinator.withdraw(progress.id, "alice").expect("own record");
    assert_eq!(withdrawn.status, ApplicationStatus::Withdrawn);

    // Submitted withdrawal, and the machine refuses steps afterwards.
    let id = submit_one(&coordinator);
    let withdrawn = coordinator.withdraw(id, "alice").expect("own record");
    assert_eq!(withdrawn.status, ApplicationStatus::Withdrawn);
    let error = coordinator
        .commit_step(id, "a", &answers(&[("interested", json!("yes"))]))
        .unwrap_err();
    assert!(matches!(error, EngineError::IllegalTransition { .. }));
}
