use std::fmt::Write;

use form_spec::{AnswerSet, Field, FieldType, FormTemplate, Step, value_to_text};
use serde_json::Value;

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: field prompts only.
    Clean,
    /// Verbose output: step status, visible fields, parse expectations.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints prompts and progress once the engine yields the next field.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_answers_json,
        }
    }

    pub fn show_header(&mut self, template: &FormTemplate) {
        if self.header_printed {
            return;
        }
        println!("Form: {}", template.title);
        if self.verbosity.is_verbose()
            && let Some(description) = &template.description
        {
            println!("{}", description);
        }
        self.header_printed = true;
    }

    pub fn show_step(&self, step: &Step, index: usize, total: usize) {
        if total > 0 {
            println!("Step {}/{}: {}", index, total, step.title);
        } else {
            println!("Step: {}", step.title);
        }
        if let Some(description) = &step.description {
            println!("{}", description);
        }
    }

    pub fn show_visible_fields(&self, fields: &[&Field]) {
        if !self.verbosity.is_verbose() {
            return;
        }
        println!("Visible fields:");
        for field in fields {
            let mut entry = format!(" - {} ({})", field.id, field.label);
            if field.required {
                entry.push_str(" [required]");
            }
            println!("{}", entry);
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = if prompt.total > 0 {
            format!("{}/{} {}", prompt.index, prompt.total, prompt.label)
        } else {
            format!("{} {}", prompt.index, prompt.label)
        };
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        if let Some(current) = &prompt.current {
            let _ = write!(&mut line, " [{}]", value_to_text(current));
        }
        println!("{}", line);
        if let Some(description) = &prompt.description {
            println!("{}", description);
        }
        if self.verbosity.is_verbose() && !prompt.choices.is_empty() {
            println!("Choices: {}", prompt.choices.join(", "));
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if let Some(debug) = &error.debug_message {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_completion(&self, answers: &AnswerSet) {
        println!("Done ✅");
        match answers.to_cbor() {
            Ok(bytes) => {
                println!("Answers (CBOR hex): {}", encode_hex(&bytes));
            }
            Err(err) => {
                eprintln!("Failed to serialize answers to CBOR: {}", err);
            }
        }
        if self.show_answers_json {
            match answers.to_json_pretty() {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => {
                    eprintln!("Failed to serialize answers to JSON: {}", err);
                }
            }
        }
    }
}

/// Context used to format a single field prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub label: String,
    pub description: Option<String>,
    pub required: bool,
    pub hint: Option<String>,
    pub choices: Vec<String>,
    pub current: Option<Value>,
}

impl PromptContext {
    pub fn new(field: &Field, index: usize, total: usize, current: Option<Value>) -> Self {
        let choices = field
            .choices()
            .iter()
            .map(|choice| choice.label.clone())
            .collect::<Vec<_>>();
        let hint = type_hint(field, &choices);
        Self {
            index: index.max(1),
            total,
            label: field.label.clone(),
            description: field.description.clone(),
            required: field.required,
            hint,
            choices,
            current,
        }
    }
}

fn type_hint(field: &Field, choices: &[String]) -> Option<String> {
    match field.kind {
        FieldType::Toggle => Some("(yes/no, y/n, true/false)".to_string()),
        FieldType::Range => Some("(number)".to_string()),
        FieldType::File => Some("(file path or URL)".to_string()),
        FieldType::Select | FieldType::Radio if !choices.is_empty() => {
            Some(format!("({})", choices.join("/")))
        }
        FieldType::Checkbox if !choices.is_empty() => {
            Some(format!("(comma separated: {})", choices.join("/")))
        }
        FieldType::Checkbox => Some("(yes/no, y/n, true/false)".to_string()),
        _ => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(&mut encoded, "{:02x}", byte).expect("writing to string cannot fail");
    }
    encoded
}
