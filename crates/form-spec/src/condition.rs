use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::answers::{AnswerSet, value_as_number, value_is_empty, value_to_text};

/// Comparison applied between a stored answer and the authored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
    NotContains,
    IsEmpty,
    IsNotEmpty,
    /// Operators introduced by newer template revisions land here.
    #[serde(other)]
    Unknown,
}

/// Visibility gate attached to a step or field.
///
/// `field` names an answer from an earlier position in the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Condition {
    pub field: String,
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
}

/// Evaluates one condition against the stored answers.
///
/// A missing answer reads as empty text for the text operators and has no
/// numeric reading for the ordering operators, so ordering comparisons on
/// absent or non-numeric answers are false. Unrecognized operators
/// evaluate true: content authored for a newer operator set must not
/// silently disappear on older engines.
pub fn evaluate(condition: &Condition, answers: &AnswerSet) -> bool {
    let answer = answers.get(&condition.field);
    match condition.operator {
        ConditionOperator::Equals => answer_text(answer) == value_to_text(&condition.value),
        ConditionOperator::NotEquals => answer_text(answer) != value_to_text(&condition.value),
        ConditionOperator::GreaterThan => {
            match (answer_number(answer), value_as_number(&condition.value)) {
                (Some(left), Some(right)) => left > right,
                _ => false,
            }
        }
        ConditionOperator::LessThan => {
            match (answer_number(answer), value_as_number(&condition.value)) {
                (Some(left), Some(right)) => left < right,
                _ => false,
            }
        }
        ConditionOperator::Contains => {
            answer_text(answer).contains(&value_to_text(&condition.value))
        }
        ConditionOperator::NotContains => {
            !answer_text(answer).contains(&value_to_text(&condition.value))
        }
        ConditionOperator::IsEmpty => answer_empty(answer),
        ConditionOperator::IsNotEmpty => !answer_empty(answer),
        ConditionOperator::Unknown => true,
    }
}

/// AND over all conditions; an empty list gates nothing.
pub fn evaluate_all(conditions: &[Condition], answers: &AnswerSet) -> bool {
    conditions
        .iter()
        .all(|condition| evaluate(condition, answers))
}

fn answer_text(answer: Option<&Value>) -> String {
    answer.map(value_to_text).unwrap_or_default()
}

fn answer_number(answer: Option<&Value>) -> Option<f64> {
    answer.and_then(value_as_number)
}

fn answer_empty(answer: Option<&Value>) -> bool {
    answer.is_none_or(value_is_empty)
}
