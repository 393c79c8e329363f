use serde::Serialize;

use form_spec::{
    AnswerSet, FormTemplate, MalformedTemplate, Step, ViolationMap, check_template, evaluate_all,
    validate_step, visible_steps,
};

use crate::error::EngineError;
use crate::progress::{ApplicationProgress, ApplicationStatus, Cursor};

/// Result of one step commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum StepOutcome {
    /// Violations found; the record keeps the attempted values and the map.
    Rejected { violations: ViolationMap },
    /// Step accepted, cursor moved to the named step.
    Advanced { next_step: String },
    /// Step accepted and no later visible step remains.
    Completed,
}

/// Advancement machine over one integrity-checked template.
///
/// Visibility is recomputed from scratch on every transition; nothing is
/// carried incrementally between commits.
#[derive(Debug, Clone)]
pub struct StepMachine {
    template: FormTemplate,
}

impl StepMachine {
    pub fn new(template: FormTemplate) -> Result<Self, MalformedTemplate> {
        check_template(&template)?;
        Ok(Self { template })
    }

    pub fn template(&self) -> &FormTemplate {
        &self.template
    }

    pub fn first_step(&self) -> &Step {
        self.template
            .steps
            .iter()
            .min_by_key(|step| step.order)
            .expect("checked template has steps")
    }

    /// Commits `incoming` for the step the cursor points at.
    ///
    /// Rejection leaves cursor and status alone but records the attempted
    /// values and the violation map on the progress. Acceptance merges the
    /// answers, clears the step's recorded errors, and moves the cursor to
    /// the lowest visible step past this one, or to `Completed`.
    pub fn submit_step(
        &self,
        progress: &mut ApplicationProgress,
        step_id: &str,
        incoming: &AnswerSet,
    ) -> Result<StepOutcome, EngineError> {
        if progress.status != ApplicationStatus::Draft {
            return Err(EngineError::illegal(format!(
                "step submission requires draft status, found {}",
                progress.status.as_str()
            )));
        }
        let step = self
            .template
            .step(step_id)
            .ok_or_else(|| EngineError::UnknownStep(step_id.to_string()))?;
        let position = step.order as usize;
        if progress.cursor != Cursor::AtStep(position) {
            return Err(EngineError::illegal(format!(
                "cursor is not at step '{step_id}'"
            )));
        }

        let mut candidate = progress.answers.clone();
        candidate.merge_from(incoming);

        // A step hidden by its own conditions has no visible fields and
        // commits trivially.
        let violations = if evaluate_all(&step.conditions, &candidate) {
            validate_step(&self.template, step, &candidate)
        } else {
            ViolationMap::new()
        };

        for field in &step.fields {
            progress.errors.remove(&field.id);
        }
        progress.answers = candidate;

        if !violations.is_empty() {
            progress.errors.extend(violations.clone());
            return Ok(StepOutcome::Rejected { violations });
        }

        progress.last_completed_step = Some(step.id.clone());
        let next = visible_steps(&self.template, &progress.answers)
            .into_iter()
            .find(|later| (later.order as usize) > position);
        match next {
            Some(next) => {
                progress.cursor = Cursor::AtStep(next.order as usize);
                progress.mark_visited(&next.id);
                Ok(StepOutcome::Advanced {
                    next_step: next.id.clone(),
                })
            }
            None => {
                progress.cursor = Cursor::Completed;
                Ok(StepOutcome::Completed)
            }
        }
    }

    /// Moves the cursor back to an earlier, previously visited step.
    /// Nothing is revalidated and no answers are cleared; re-advancing
    /// recomputes visibility and may skip steps hidden since.
    pub fn go_back(
        &self,
        progress: &mut ApplicationProgress,
        step_id: &str,
    ) -> Result<(), EngineError> {
        if progress.status != ApplicationStatus::Draft {
            return Err(EngineError::illegal(format!(
                "navigation requires draft status, found {}",
                progress.status.as_str()
            )));
        }
        let step = self
            .template
            .step(step_id)
            .ok_or_else(|| EngineError::UnknownStep(step_id.to_string()))?;
        let target = step.order as usize;
        if target >= progress.cursor.position() {
            return Err(EngineError::illegal(format!(
                "step '{step_id}' is not behind the current position"
            )));
        }
        if !progress.has_visited(step_id) {
            return Err(EngineError::illegal(format!(
                "step '{step_id}' was never visited"
            )));
        }
        progress.cursor = Cursor::AtStep(target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use form_spec::{Condition, ConditionOperator, Field, FieldType, ValidationRule};

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

    fn make_template(steps: Vec<Step>) -> FormTemplate {
        FormTemplate {
            id: "template".into(),
            title: "Template".into(),
            description: None,
            is_active: true,
            steps,
            meta: Default::default(),
        }
    }

    /// Step a asks `interested`; step b requires the answer to be yes.
    fn make_interest_machine() -> StepMachine {
        let mut interested = make_field("interested", 0);
        interested.required = true;
        let step_a = make_step("a", 0, vec![interested]);
        let mut step_b = make_step("b", 1, vec![make_field("details", 0)]);
        step_b.conditions = vec![Condition {
            field: "interested".into(),
            operator: ConditionOperator::Equals,
            value: json!("yes"),
        }];
        StepMachine::new(make_template(vec![step_a, step_b])).expect("well formed")
    }

    fn make_progress(machine: &StepMachine) -> ApplicationProgress {
        ApplicationProgress::start(
            machine.template().id.clone(),
            "alice",
            &machine.first_step().id,
        )
    }

    fn answers(pairs: &[(&str, serde_json::Value)]) -> AnswerSet {
        pairs
            .iter()
            .map(|(field, value)| (field.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn interested_yes_walks_both_steps() {
        let machine = make_interest_machine();
        let mut progress = make_progress(&machine);

        let outcome = machine
            .submit_step(&mut progress, "a", &answers(&[("interested", json!("yes"))]))
            .expect("legal");
        assert_eq!(
            outcome,
            StepOutcome::Advanced {
                next_step: "b".into(),
            }
        );
        assert_eq!(progress.cursor, Cursor::AtStep(1));
        assert_eq!(progress.last_completed_step.as_deref(), Some("a"));
        assert!(progress.has_visited("b"));

        let outcome = machine
            .submit_step(&mut progress, "b", &answers(&[("details", json!("rust"))]))
            .expect("legal");
        assert_eq!(outcome, StepOutcome::Completed);
        assert_eq!(progress.cursor, Cursor::Completed);
    }

    #[test]
    fn interested_no_skips_to_completed() {
        let machine = make_interest_machine();
        let mut progress = make_progress(&machine);

        let outcome = machine
            .submit_step(&mut progress, "a", &answers(&[("interested", json!("no"))]))
            .expect("legal");
        assert_eq!(outcome, StepOutcome::Completed);
        assert_eq!(progress.cursor, Cursor::Completed);
        assert!(!progress.has_visited("b"));
    }

    #[test]
    fn rejection_records_attempt_without_moving() {
        let machine = make_interest_machine();
        let mut progress = make_progress(&machine);

        let outcome = machine
            .submit_step(&mut progress, "a", &AnswerSet::new())
            .expect("legal call");
        let StepOutcome::Rejected { violations } = outcome else {
            panic!("expected rejection");
        };
        assert!(violations.contains_key("interested"));
        assert_eq!(progress.cursor, Cursor::AtStep(0));
        assert_eq!(progress.status, ApplicationStatus::Draft);
        assert!(progress.errors.contains_key("interested"));
        assert_eq!(progress.last_completed_step, None);
    }

    #[test]
    fn successful_commit_clears_recorded_errors() {
        let machine = make_interest_machine();
        let mut progress = make_progress(&machine);

        machine
            .submit_step(&mut progress, "a", &AnswerSet::new())
            .expect("legal call");
        assert!(!progress.errors.is_empty());

        machine
            .submit_step(&mut progress, "a", &answers(&[("interested", json!("no"))]))
            .expect("legal call");
        assert!(progress.errors.is_empty());
    }

    #[test]
    fn commit_away_from_cursor_is_illegal() {
        let machine = make_interest_machine();
        let mut progress = make_progress(&machine);

        let error = machine
            .submit_step(&mut progress, "b", &AnswerSet::new())
            .unwrap_err();
        assert!(matches!(error, EngineError::IllegalTransition { .. }));

        let error = machine
            .submit_step(&mut progress, "ghost", &AnswerSet::new())
            .unwrap_err();
        assert!(matches!(error, EngineError::UnknownStep(_)));
    }

    #[test]
    fn go_back_requires_a_visited_earlier_step() {
        let machine = make_interest_machine();
        let mut progress = make_progress(&machine);

        machine
            .submit_step(&mut progress, "a", &answers(&[("interested", json!("yes"))]))
            .expect("legal");

        let error = machine.go_back(&mut progress, "b").unwrap_err();
        assert!(matches!(error, EngineError::IllegalTransition { .. }));

        machine.go_back(&mut progress, "a").expect("visited earlier step");
        assert_eq!(progress.cursor, Cursor::AtStep(0));
    }

    #[test]
    fn changing_an_answer_reroutes_past_a_visited_step() {
        let machine = make_interest_machine();
        let mut progress = make_progress(&machine);

        machine
            .submit_step(&mut progress, "a", &answers(&[("interested", json!("yes"))]))
            .expect("legal");
        machine.go_back(&mut progress, "a").expect("visited");

        let outcome = machine
            .submit_step(&mut progress, "a", &answers(&[("interested", json!("no"))]))
            .expect("legal");
        assert_eq!(outcome, StepOutcome::Completed);
    }

    #[test]
    fn step_hidden_by_its_own_conditions_commits_trivially() {
        let mut hidden = make_step("maybe", 0, vec![{
            let mut field = make_field("secret", 0);
            field.required = true;
            field
        }]);
        hidden.conditions = vec![Condition {
            field: "secret".into(),
            operator: ConditionOperator::IsNotEmpty,
            value: json!(null),
        }];
        let machine =
            StepMachine::new(make_template(vec![hidden, make_step("always", 1, vec![])]))
                .expect("well formed");
        let mut progress = make_progress(&machine);

        let outcome = machine
            .submit_step(&mut progress, "maybe", &AnswerSet::new())
            .expect("hidden step needs nothing");
        assert_eq!(
            outcome,
            StepOutcome::Advanced {
                next_step: "always".into(),
            }
        );
    }

    #[test]
    fn submitted_records_refuse_step_traffic() {
        let machine = make_interest_machine();
        let mut progress = make_progress(&machine);
        progress.status = ApplicationStatus::Submitted;

        assert!(machine
            .submit_step(&mut progress, "a", &AnswerSet::new())
            .is_err());
        assert!(machine.go_back(&mut progress, "a").is_err());
    }
}
