use serde_json::{Map, Value, json};

use crate::answers::AnswerSet;
use crate::spec::field::{Field, FieldType};
use crate::spec::template::FormTemplate;
use crate::visibility::{visible_fields, visible_steps};

/// JSON Schema for the answer payload the currently visible fields expect.
///
/// Hidden steps and fields do not appear; callers regenerate after every
/// commit since visibility shifts with the answers.
pub fn generate(template: &FormTemplate, answers: &AnswerSet) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for step in visible_steps(template, answers) {
        for field in visible_fields(template, step, answers) {
            properties.insert(field.id.clone(), field_schema(field));
            if field.required {
                required.push(Value::String(field.id.clone()));
            }
        }
    }

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": template.title,
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn field_schema(field: &Field) -> Value {
    let mut schema = Map::new();
    schema.insert("title".into(), Value::String(field.label.clone()));
    if let Some(description) = &field.description {
        schema.insert("description".into(), Value::String(description.clone()));
    }

    match field.kind {
        FieldType::Text | FieldType::Textarea | FieldType::File => {
            schema.insert("type".into(), Value::String("string".into()));
            if let Some(min) = field.validation.min {
                schema.insert("minLength".into(), json!(min as u64));
            }
            if let Some(max) = field.validation.max {
                schema.insert("maxLength".into(), json!(max as u64));
            }
            if let Some(pattern) = &field.validation.pattern {
                schema.insert("pattern".into(), Value::String(pattern.clone()));
            }
        }
        FieldType::Select | FieldType::Radio => {
            schema.insert("enum".into(), choice_values(field));
        }
        FieldType::Checkbox => {
            if field.choices().is_empty() {
                schema.insert("type".into(), Value::String("boolean".into()));
            } else {
                schema.insert("type".into(), Value::String("array".into()));
                schema.insert("items".into(), json!({ "enum": choice_values(field) }));
            }
        }
        FieldType::Range => {
            schema.insert("type".into(), Value::String("number".into()));
            let options = field.options.as_ref();
            if let Some(min) = field
                .validation
                .min
                .or_else(|| options.and_then(|options| options.min))
            {
                schema.insert("minimum".into(), json!(min));
            }
            if let Some(max) = field
                .validation
                .max
                .or_else(|| options.and_then(|options| options.max))
            {
                schema.insert("maximum".into(), json!(max));
            }
        }
        FieldType::Toggle => {
            schema.insert("type".into(), Value::String("boolean".into()));
        }
    }

    Value::Object(schema)
}

fn choice_values(field: &Field) -> Value {
    Value::Array(
        field
            .choices()
            .iter()
            .map(|choice| choice.value.clone())
            .collect(),
    )
}
