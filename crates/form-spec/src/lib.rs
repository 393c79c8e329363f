#![allow(missing_docs)]

pub mod answers;
pub mod answers_schema;
pub mod condition;
pub mod integrity;
pub mod message;
pub mod spec;
pub mod validate;
pub mod visibility;

pub use answers::{AnswerSet, value_as_number, value_is_empty, value_to_text};
pub use answers_schema::generate as answers_schema;
pub use condition::{Condition, ConditionOperator, evaluate, evaluate_all};
pub use integrity::{MalformedTemplate, check as check_template};
pub use message::{MessageContext, render_message};
pub use spec::{
    ChoiceOption, Field, FieldOptions, FieldType, FormTemplate, RuleKind, Step, ValidationRule,
};
pub use validate::{
    Violation, ViolationCode, ViolationMap, validate_field, validate_step, violation_count,
};
pub use visibility::{
    VisibilityMap, field_visibility, scope_for_field, step_visibility, visible_fields,
    visible_steps,
};
