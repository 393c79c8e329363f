use handlebars::Handlebars;
use serde::Serialize;
use serde_json::Value;

use crate::spec::field::Field;

/// Context fed to violation message templates.
///
/// Templates may reference `{{field}}`, `{{label}}`, `{{value}}`,
/// `{{min}}` and `{{max}}`.
#[derive(Debug, Clone, Serialize)]
pub struct MessageContext {
    pub field: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
}

impl MessageContext {
    pub fn for_field(field: &Field, value: Option<&Value>) -> Self {
        Self {
            field: field.id.clone(),
            label: field.label.clone(),
            value: value.cloned(),
            min: field.validation.min.map(bound_value),
            max: field.validation.max.map(bound_value),
        }
    }
}

/// Renders a message template against the context; a template that fails
/// to render falls back to its raw text.
pub fn render_message(template: &str, context: &MessageContext) -> String {
    let handlebars = Handlebars::new();
    handlebars
        .render_template(template, context)
        .unwrap_or_else(|_| template.to_string())
}

// Whole bounds render without a trailing `.0`.
fn bound_value(bound: f64) -> Value {
    if bound.is_finite() && bound.fract() == 0.0 && bound.abs() < i64::MAX as f64 {
        Value::from(bound as i64)
    } else {
        Value::from(bound)
    }
}
