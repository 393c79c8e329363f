//! Visibility of steps and fields given the answers entered so far.
//!
//! Step conditions see the full stored answer set, including answers of
//! steps that have since become invisible (stale answers are kept, not
//! purged). Field conditions see only what was entered before the field's
//! position: all answers from earlier steps plus same-step answers with a
//! smaller field order index.

use crate::answers::AnswerSet;
use crate::condition::evaluate_all;
use crate::spec::field::Field;
use crate::spec::step::Step;
use crate::spec::template::FormTemplate;

pub type VisibilityMap = std::collections::BTreeMap<String, bool>;

/// Visible steps in ascending order index.
pub fn visible_steps<'t>(template: &'t FormTemplate, answers: &AnswerSet) -> Vec<&'t Step> {
    template
        .ordered_steps()
        .into_iter()
        .filter(|step| evaluate_all(&step.conditions, answers))
        .collect()
}

/// Step id to visibility, every step present.
pub fn step_visibility(template: &FormTemplate, answers: &AnswerSet) -> VisibilityMap {
    template
        .steps
        .iter()
        .map(|step| (step.id.clone(), evaluate_all(&step.conditions, answers)))
        .collect()
}

/// Visible fields of one step in ascending field order index.
pub fn visible_fields<'t>(
    template: &FormTemplate,
    step: &'t Step,
    answers: &AnswerSet,
) -> Vec<&'t Field> {
    step.ordered_fields()
        .into_iter()
        .filter(|field| {
            let scope = scope_for_field(template, step, field, answers);
            evaluate_all(&field.conditions, &scope)
        })
        .collect()
}

/// Field id to visibility for one step, every field present.
pub fn field_visibility(template: &FormTemplate, step: &Step, answers: &AnswerSet) -> VisibilityMap {
    step.fields
        .iter()
        .map(|field| {
            let scope = scope_for_field(template, step, field, answers);
            (field.id.clone(), evaluate_all(&field.conditions, &scope))
        })
        .collect()
}

/// Answers available to conditions on `field`: everything entered in
/// earlier steps plus same-step answers with a smaller field order index.
pub fn scope_for_field(
    template: &FormTemplate,
    step: &Step,
    field: &Field,
    answers: &AnswerSet,
) -> AnswerSet {
    let mut scope = earlier_step_answers(template, step, answers);
    for sibling in &step.fields {
        if sibling.order < field.order
            && let Some(value) = answers.get(&sibling.id)
        {
            scope.insert(sibling.id.clone(), value.clone());
        }
    }
    scope
}

fn earlier_step_answers(template: &FormTemplate, step: &Step, answers: &AnswerSet) -> AnswerSet {
    let mut scope = AnswerSet::new();
    for earlier in &template.steps {
        if earlier.order >= step.order {
            continue;
        }
        for field in &earlier.fields {
            if let Some(value) = answers.get(&field.id) {
                scope.insert(field.id.clone(), value.clone());
            }
        }
    }
    scope
}
