use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::spec::template::FormTemplate;

/// Structural defects that reject a template at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedTemplate {
    #[error("template '{template}' has no steps")]
    NoSteps { template: String },
    #[error("duplicate step id '{step}'")]
    DuplicateStepId { step: String },
    #[error("step order indices must cover 0..{expected} contiguously, found {found:?}")]
    StepOrder { expected: usize, found: Vec<u32> },
    #[error("duplicate field id '{field}'")]
    DuplicateFieldId { field: String },
    #[error("field order indices in step '{step}' must cover 0..{expected} contiguously, found {found:?}")]
    FieldOrder {
        step: String,
        expected: usize,
        found: Vec<u32>,
    },
    #[error("choice field '{field}' declares no choices")]
    MissingChoices { field: String },
    #[error("condition on '{owner}' references unknown field '{field}'")]
    UnknownConditionField { owner: String, field: String },
    #[error("condition on '{owner}' references later field '{field}'")]
    ForwardConditionReference { owner: String, field: String },
}

/// Checks the structural invariants a published template must satisfy.
///
/// Field ids must be unique across the whole template because the answer
/// set is one flat map keyed by field id.
pub fn check(template: &FormTemplate) -> Result<(), MalformedTemplate> {
    if template.steps.is_empty() {
        return Err(MalformedTemplate::NoSteps {
            template: template.id.clone(),
        });
    }

    let mut step_orders: Vec<u32> = template.steps.iter().map(|step| step.order).collect();
    step_orders.sort_unstable();
    if !contiguous(&step_orders) {
        return Err(MalformedTemplate::StepOrder {
            expected: template.steps.len(),
            found: step_orders,
        });
    }

    let mut step_ids = BTreeSet::new();
    for step in &template.steps {
        if !step_ids.insert(step.id.as_str()) {
            return Err(MalformedTemplate::DuplicateStepId {
                step: step.id.clone(),
            });
        }
        let mut field_orders: Vec<u32> = step.fields.iter().map(|field| field.order).collect();
        field_orders.sort_unstable();
        if !contiguous(&field_orders) {
            return Err(MalformedTemplate::FieldOrder {
                step: step.id.clone(),
                expected: step.fields.len(),
                found: field_orders,
            });
        }
    }

    let mut positions: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
    for step in &template.steps {
        for field in &step.fields {
            if positions
                .insert(field.id.as_str(), (step.order, field.order))
                .is_some()
            {
                return Err(MalformedTemplate::DuplicateFieldId {
                    field: field.id.clone(),
                });
            }
            if field.kind.is_choice() && field.choices().is_empty() {
                return Err(MalformedTemplate::MissingChoices {
                    field: field.id.clone(),
                });
            }
        }
    }

    for step in &template.steps {
        for condition in &step.conditions {
            let Some(&(target_step, _)) = positions.get(condition.field.as_str()) else {
                return Err(MalformedTemplate::UnknownConditionField {
                    owner: step.id.clone(),
                    field: condition.field.clone(),
                });
            };
            if target_step > step.order {
                return Err(MalformedTemplate::ForwardConditionReference {
                    owner: step.id.clone(),
                    field: condition.field.clone(),
                });
            }
        }
        for field in &step.fields {
            for condition in &field.conditions {
                let Some(&(target_step, target_field)) = positions.get(condition.field.as_str())
                else {
                    return Err(MalformedTemplate::UnknownConditionField {
                        owner: field.id.clone(),
                        field: condition.field.clone(),
                    });
                };
                if target_step > step.order
                    || (target_step == step.order && target_field >= field.order)
                {
                    return Err(MalformedTemplate::ForwardConditionReference {
                        owner: field.id.clone(),
                        field: condition.field.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}

fn contiguous(sorted: &[u32]) -> bool {
    sorted
        .iter()
        .enumerate()
        .all(|(index, &order)| order as usize == index)
}
