use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::answers::{AnswerSet, value_as_number, value_is_empty, value_to_text};
use crate::message::{MessageContext, render_message};
use crate::spec::field::{Field, FieldType, RuleKind};
use crate::spec::step::Step;
use crate::spec::template::FormTemplate;
use crate::visibility::visible_fields;

/// Machine-readable category of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCode {
    Required,
    OutOfRange,
    PatternMismatch,
    UnknownChoice,
}

/// One failed check on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub code: ViolationCode,
    pub message: String,
}

/// Field id to its violations, only fields with at least one entry.
pub type ViolationMap = BTreeMap<String, Vec<Violation>>;

pub fn violation_count(violations: &ViolationMap) -> usize {
    violations.values().map(Vec::len).sum()
}

const MSG_REQUIRED: &str = "This field is required";
const MSG_PATTERN: &str = "Invalid format";
const MSG_MIN_VALUE: &str = "Minimum value is {{min}}";
const MSG_MAX_VALUE: &str = "Maximum value is {{max}}";
const MSG_MIN_LENGTH: &str = "Must be at least {{min}} characters";
const MSG_MAX_LENGTH: &str = "Must be at most {{max}} characters";
const MSG_MIN_CHOICES: &str = "Select at least {{min}} options";
const MSG_MAX_CHOICES: &str = "Select at most {{max}} options";
const MSG_UNKNOWN_CHOICE: &str = "Not one of the available options";

/// Checks one field against its declared rules.
///
/// All applicable rules run; violations accumulate rather than
/// short-circuit. An empty value only ever yields `required` since the
/// remaining rules describe an entered value.
pub fn validate_field(field: &Field, value: Option<&Value>) -> Vec<Violation> {
    let mut violations = Vec::new();
    let context = MessageContext::for_field(field, value);

    let Some(value) = value.filter(|candidate| !value_is_empty(candidate)) else {
        if field.required {
            push(&mut violations, field, ViolationCode::Required, MSG_REQUIRED, &context);
        }
        return violations;
    };

    check_bounds(field, value, &context, &mut violations);
    check_pattern(field, value, &context, &mut violations);
    check_choices(field, value, &context, &mut violations);

    violations
}

/// Validates every currently visible field of a step against the candidate
/// answers. Invisible fields never contribute.
pub fn validate_step(template: &FormTemplate, step: &Step, answers: &AnswerSet) -> ViolationMap {
    let mut map = ViolationMap::new();
    for field in visible_fields(template, step, answers) {
        let violations = validate_field(field, answers.get(&field.id));
        if !violations.is_empty() {
            map.insert(field.id.clone(), violations);
        }
    }
    map
}

fn push(
    violations: &mut Vec<Violation>,
    field: &Field,
    code: ViolationCode,
    template: &str,
    context: &MessageContext,
) {
    violations.push(Violation {
        field: field.id.clone(),
        code,
        message: render_message(template, context),
    });
}

/// Bounds read the character count for text fields, the numeric value for
/// range fields, and the selection count for list answers. A range answer
/// with no numeric reading passes silently.
fn check_bounds(
    field: &Field,
    value: &Value,
    context: &MessageContext,
    violations: &mut Vec<Violation>,
) {
    let (measured, min_msg, max_msg) = if field.kind.is_text_like() {
        let length = value_to_text(value).chars().count() as f64;
        (Some(length), MSG_MIN_LENGTH, MSG_MAX_LENGTH)
    } else if field.kind.is_numeric() {
        (value_as_number(value), MSG_MIN_VALUE, MSG_MAX_VALUE)
    } else if field.kind == FieldType::Checkbox
        && let Value::Array(items) = value
    {
        (Some(items.len() as f64), MSG_MIN_CHOICES, MSG_MAX_CHOICES)
    } else {
        return;
    };
    let Some(measured) = measured else {
        return;
    };

    if let Some(min) = field.validation.min
        && measured < min
    {
        push(violations, field, ViolationCode::OutOfRange, min_msg, context);
    }
    if let Some(max) = field.validation.max
        && measured > max
    {
        push(violations, field, ViolationCode::OutOfRange, max_msg, context);
    }
}

fn check_pattern(
    field: &Field,
    value: &Value,
    context: &MessageContext,
    violations: &mut Vec<Violation>,
) {
    let Some(pattern) = explicit_or_builtin_pattern(&field.validation.pattern, field.validation.kind)
    else {
        return;
    };
    let text = value_to_text(value);
    // An unparseable pattern skips the check rather than failing the value.
    if let Ok(regex) = Regex::new(&pattern)
        && !regex.is_match(&text)
    {
        let template = field
            .validation
            .message
            .as_deref()
            .unwrap_or_else(|| builtin_message(field.validation.kind));
        push(violations, field, ViolationCode::PatternMismatch, template, context);
    }
}

fn check_choices(
    field: &Field,
    value: &Value,
    context: &MessageContext,
    violations: &mut Vec<Violation>,
) {
    let choices = field.choices();
    let applies = field.kind.is_choice() || (field.kind == FieldType::Checkbox && !choices.is_empty());
    if !applies || choices.is_empty() {
        return;
    }

    let entries: Vec<String> = match value {
        Value::Array(items) => items.iter().map(value_to_text).collect(),
        other => vec![value_to_text(other)],
    };
    let allowed: Vec<String> = choices
        .iter()
        .map(|choice| value_to_text(&choice.value))
        .collect();

    if entries.iter().any(|entry| !allowed.contains(entry)) {
        push(violations, field, ViolationCode::UnknownChoice, MSG_UNKNOWN_CHOICE, context);
    }
}

fn explicit_or_builtin_pattern(pattern: &Option<String>, kind: RuleKind) -> Option<String> {
    if let Some(pattern) = pattern {
        return Some(pattern.clone());
    }
    builtin_pattern(kind).map(String::from)
}

fn builtin_pattern(kind: RuleKind) -> Option<&'static str> {
    match kind {
        RuleKind::None => None,
        RuleKind::Email => Some(r"^[^@\s]+@[^@\s]+\.[^@\s]+$"),
        RuleKind::Phone => Some(r"^\+?[0-9][0-9 ().-]{5,19}$"),
        RuleKind::GithubUrl => Some(r"^https?://(www\.)?github\.com/[A-Za-z0-9_.-]+/?"),
        RuleKind::Linkedin => Some(r"^https?://(www\.)?linkedin\.com/.+"),
        RuleKind::Twitter => Some(r"^https?://(www\.)?(twitter\.com|x\.com)/.+"),
        RuleKind::Website => Some(r"^https?://.+"),
    }
}

fn builtin_message(kind: RuleKind) -> &'static str {
    match kind {
        RuleKind::None => MSG_PATTERN,
        RuleKind::Email => "Enter a valid email address",
        RuleKind::Phone => "Enter a valid phone number",
        RuleKind::GithubUrl => "Enter a valid GitHub profile URL",
        RuleKind::Linkedin => "Enter a valid LinkedIn profile URL",
        RuleKind::Twitter => "Enter a valid Twitter/X profile URL",
        RuleKind::Website => "Enter a valid website URL",
    }
}
