use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::Condition;

/// Closed set of input widgets a field can render as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Textarea,
    Select,
    Checkbox,
    Radio,
    File,
    Range,
    Toggle,
}

impl FieldType {
    /// Types whose answers are drawn from a declared choice list.
    pub fn is_choice(self) -> bool {
        matches!(self, FieldType::Select | FieldType::Radio)
    }

    /// Types whose min/max bounds apply to the numeric value.
    pub fn is_numeric(self) -> bool {
        matches!(self, FieldType::Range)
    }

    /// Types whose min/max bounds apply to the character count.
    pub fn is_text_like(self) -> bool {
        matches!(self, FieldType::Text | FieldType::Textarea)
    }
}

/// One selectable option of a choice field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChoiceOption {
    pub label: String,
    pub value: Value,
}

/// Presentation and input hints attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct FieldOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<ChoiceOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default)]
    pub multiple: bool,
}

/// Named semantic rules that expand to built-in patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    #[default]
    None,
    Email,
    Phone,
    GithubUrl,
    Linkedin,
    Twitter,
    Website,
}

/// Declarative validation attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ValidationRule {
    #[serde(default, rename = "type")]
    pub kind: RuleKind,
    /// Custom violation message; overrides the built-in default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// One field of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Field {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<FieldOptions>,
    #[serde(default)]
    pub validation: ValidationRule,
    pub order: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl Field {
    /// Declared choice options, empty for non-choice fields.
    pub fn choices(&self) -> &[ChoiceOption] {
        self.options
            .as_ref()
            .map(|options| options.choices.as_slice())
            .unwrap_or_default()
    }
}
