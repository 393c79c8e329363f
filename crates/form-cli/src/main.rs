mod wizard;

use clap::{Parser, Subcommand};
use form_engine::{AllowAll, MemoryStore, StepOutcome, SubmissionCoordinator};
use form_spec::{
    AnswerSet, Field, FieldType, FormTemplate, ViolationMap, answers_schema, check_template,
    validate_step, value_to_text, violation_count, visible_fields, visible_steps,
};
use serde_json::{Number, Value};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use wizard::{AnswerParseError, PromptContext, Verbosity, WizardPresenter};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Multi-step application form runner",
    long_about = "Inspects, validates, and walks conditional multi-step form templates backed by the form engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a form template and summarize its steps.
    Inspect {
        /// Path to the form template JSON.
        #[arg(long, value_name = "TEMPLATE")]
        template: PathBuf,
        /// Optional JSON file with answers driving visibility.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
    /// Validate answers against the visible fields of a template.
    Validate {
        /// Path to the form template JSON.
        #[arg(long, value_name = "TEMPLATE")]
        template: PathBuf,
        /// Path to the answers JSON file.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Emit a JSON Schema for the currently visible answers.
    Schema {
        /// Path to the form template JSON.
        #[arg(long, value_name = "TEMPLATE")]
        template: PathBuf,
        /// Optional JSON file with answers driving visibility.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
    /// Walk an application through every visible step and submit it.
    Submit {
        /// Path to the form template JSON.
        #[arg(long, value_name = "TEMPLATE")]
        template: PathBuf,
        /// Path to the answers JSON file.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        /// Acting subject; defaults to $FORMFLOW_SUBJECT or "local".
        #[arg(long, value_name = "NAME")]
        subject: Option<String>,
    },
    /// Fill a form interactively, one visible field at a time.
    Wizard {
        /// Path to the form template JSON.
        #[arg(long, value_name = "TEMPLATE")]
        template: PathBuf,
        /// Optional JSON file containing initial answers.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Show verbose output (statuses, visible fields, parse expectations).
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Also emit answer JSON on completion.
        #[arg(long)]
        answers_json: bool,
    },
}

fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Inspect { template, answers } => run_inspect(template, answers),
        Command::Validate { template, answers } => run_validate(template, answers),
        Command::Schema { template, answers } => run_schema(template, answers),
        Command::Submit {
            template,
            answers,
            subject,
        } => run_submit(template, answers, subject),
        Command::Wizard {
            template,
            answers,
            verbose,
            answers_json,
        } => run_wizard(template, answers, verbose, answers_json),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();
}

fn run_inspect(template_path: PathBuf, answers_path: Option<PathBuf>) -> CliResult<()> {
    let template = load_template(&template_path)?;
    let answers = load_answers(answers_path.as_deref())?;

    println!("Form: {} ({})", template.title, template.id);
    if !template.is_active {
        println!("Inactive: no longer accepting applications.");
    }
    let shown = visible_steps(&template, &answers);
    println!(
        "Steps: {} declared, {} visible",
        template.steps.len(),
        shown.len()
    );
    for step in template.ordered_steps() {
        let visible = shown.iter().any(|candidate| candidate.id == step.id);
        let marker = if visible { "+" } else { "-" };
        println!("{} {} ({})", marker, step.title, step.id);
        if !visible {
            continue;
        }
        for field in visible_fields(&template, step, &answers) {
            let mut entry = format!("    {} ({})", field.label, field.id);
            if field.required {
                entry.push_str(" *");
            }
            println!("{}", entry);
        }
    }
    Ok(())
}

fn run_validate(template_path: PathBuf, answers_path: PathBuf) -> CliResult<()> {
    let template = load_template(&template_path)?;
    let answers = load_answers(Some(&answers_path))?;

    let mut report = ViolationMap::new();
    for step in visible_steps(&template, &answers) {
        report.extend(validate_step(&template, step, &answers));
    }

    println!(
        "Validation result: {}",
        if report.is_empty() { "valid" } else { "invalid" }
    );
    if report.is_empty() {
        return Ok(());
    }
    println!("Errors ({}):", violation_count(&report));
    print_violation_report(&report);
    Err("validation failed".into())
}

fn run_schema(template_path: PathBuf, answers_path: Option<PathBuf>) -> CliResult<()> {
    let template = load_template(&template_path)?;
    let answers = load_answers(answers_path.as_deref())?;
    let schema = answers_schema(&template, &answers);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn run_submit(
    template_path: PathBuf,
    answers_path: PathBuf,
    subject: Option<String>,
) -> CliResult<()> {
    let template = load_template(&template_path)?;
    let template_id = template.id.clone();
    let answers = load_answers(Some(&answers_path))?;
    let subject = resolve_subject(subject);

    let mut coordinator = SubmissionCoordinator::new(MemoryStore::new(), AllowAll);
    coordinator.register(template)?;
    let progress = coordinator.start_application(&template_id, &subject)?;
    let id = progress.id;
    let mut step_id = match progress.visited.first() {
        Some(step) => step.clone(),
        None => return Err("template has no steps".into()),
    };

    loop {
        let commit = coordinator.commit_step(id, &step_id, &answers)?;
        match commit.outcome {
            StepOutcome::Rejected { violations } => {
                println!("Validation result: invalid (step '{}')", step_id);
                print_violation_report(&violations);
                return Err("validation failed".into());
            }
            StepOutcome::Advanced { next_step } => step_id = next_step,
            StepOutcome::Completed => break,
        }
    }

    let submitted = coordinator.finalize(id, &subject)?;
    println!("{}", serde_json::to_string_pretty(&submitted)?);
    Ok(())
}

fn run_wizard(
    template_path: PathBuf,
    answers_path: Option<PathBuf>,
    verbose: bool,
    answers_json: bool,
) -> CliResult<()> {
    let template = load_template(&template_path)?;
    let template_id = template.id.clone();
    let initial = load_answers(answers_path.as_deref())?;
    let subject = resolve_subject(None);

    let mut coordinator = SubmissionCoordinator::new(MemoryStore::new(), AllowAll);
    coordinator.register(template)?;
    let template = coordinator
        .template(&template_id)
        .ok_or("template missing after registration")?;
    let progress = coordinator.start_application(&template_id, &subject)?;
    let id = progress.id;
    let mut step_id = match progress.visited.first() {
        Some(step) => step.clone(),
        None => return Err("template has no steps".into()),
    };
    let mut trail = vec![step_id.clone()];
    let mut answers = initial;
    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), answers_json);

    'steps: loop {
        let Some(step) = template.step(&step_id) else {
            return Err(format!("unknown step '{}'", step_id).into());
        };
        presenter.show_header(template);
        let shown = visible_steps(template, &answers);
        let position = shown.iter().position(|candidate| candidate.id == step.id);
        presenter.show_step(step, position.map_or(0, |index| index + 1), shown.len());
        presenter.show_visible_fields(&visible_fields(template, step, &answers));

        let mut index = 0;
        loop {
            let fields = visible_fields(template, step, &answers);
            let Some(field) = fields.get(index).copied() else {
                break;
            };
            let prompt =
                PromptContext::new(field, index + 1, fields.len(), answers.get(&field.id).cloned());
            match prompt_field(&prompt, field, &presenter)? {
                PromptAction::Exit => return Err("wizard aborted by user".into()),
                PromptAction::Back => {
                    if index > 0 {
                        index -= 1;
                        continue;
                    }
                    if trail.len() > 1 {
                        trail.pop();
                        if let Some(previous) = trail.last() {
                            coordinator.go_back(id, previous)?;
                            step_id = previous.clone();
                            continue 'steps;
                        }
                    }
                    println!("Already at the first step.");
                }
                PromptAction::Answer(value) => {
                    answers.insert(field.id.clone(), value);
                    index += 1;
                }
            }
        }

        let commit = coordinator.commit_step(id, &step_id, &answers)?;
        match commit.outcome {
            StepOutcome::Rejected { violations } => {
                print_violation_errors(&violations);
            }
            StepOutcome::Advanced { next_step } => {
                trail.push(next_step.clone());
                step_id = next_step;
            }
            StepOutcome::Completed => break,
        }
    }

    let submitted = coordinator.finalize(id, &subject)?;
    presenter.show_completion(&submitted.answers);
    println!("Application {} submitted.", submitted.id);
    Ok(())
}

fn load_template(path: &Path) -> CliResult<FormTemplate> {
    let contents = fs::read_to_string(path)?;
    let template: FormTemplate = serde_json::from_str(&contents)?;
    check_template(&template)
        .map_err(|err| format!("template '{}' is malformed: {}", template.id, err))?;
    debug!(template = %template.id, steps = template.steps.len(), "template loaded");
    Ok(template)
}

fn load_answers(path: Option<&Path>) -> CliResult<AnswerSet> {
    match path {
        Some(path) => {
            let contents = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        }
        None => Ok(AnswerSet::new()),
    }
}

fn resolve_subject(flag: Option<String>) -> String {
    flag.or_else(|| env::var("FORMFLOW_SUBJECT").ok())
        .filter(|subject| !subject.trim().is_empty())
        .unwrap_or_else(|| "local".into())
}

fn print_violation_report(report: &ViolationMap) {
    for (field, violations) in report {
        for violation in violations {
            println!("  {} - {}", field, violation.message);
        }
    }
}

fn print_violation_errors(report: &ViolationMap) {
    eprintln!("Validation errors:");
    for (field, violations) in report {
        for violation in violations {
            eprintln!("  {}: {}", field, violation.message);
        }
    }
}

enum PromptAction {
    Answer(Value),
    Back,
    Exit,
}

fn prompt_field(
    prompt: &PromptContext,
    field: &Field,
    presenter: &WizardPresenter,
) -> CliResult<PromptAction> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err("unexpected end of input".into());
        }

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Ok(PromptAction::Exit);
        }
        if trimmed.eq_ignore_ascii_case("back") {
            return Ok(PromptAction::Back);
        }

        match parse_field_answer(field, trimmed, prompt.current.as_ref()) {
            Ok(value) => return Ok(PromptAction::Answer(value)),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn parse_field_answer(
    field: &Field,
    raw: &str,
    current: Option<&Value>,
) -> Result<Value, AnswerParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        if let Some(current) = current {
            return Ok(current.clone());
        }
        if !field.required {
            return Ok(Value::Null);
        }
        return Err(AnswerParseError::new("This field requires an answer.", None));
    }

    match field.kind {
        FieldType::Toggle => parse_toggle(trimmed),
        FieldType::Range => parse_number_answer(trimmed),
        FieldType::Select | FieldType::Radio => parse_choice(field, trimmed),
        FieldType::Checkbox if !field.choices().is_empty() => parse_selection(field, trimmed),
        FieldType::Checkbox => parse_toggle(trimmed),
        _ => Ok(Value::String(trimmed.to_string())),
    }
}

fn parse_toggle(raw: &str) -> Result<Value, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
        "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

fn parse_number_answer(raw: &str) -> Result<Value, AnswerParseError> {
    raw.parse::<f64>()
        .map_err(|_| {
            AnswerParseError::new("Please enter a number.", Some("expected number".to_string()))
        })
        .and_then(|value| {
            Number::from_f64(value).map(Value::Number).ok_or_else(|| {
                AnswerParseError::new(
                    "Please enter a finite number.",
                    Some("number must be finite".to_string()),
                )
            })
        })
}

fn parse_choice(field: &Field, raw: &str) -> Result<Value, AnswerParseError> {
    let choices = field.choices();
    if choices.is_empty() {
        return Err(AnswerParseError::new(
            "Choices are not defined for this field.",
            None,
        ));
    }
    if let Some(choice) = choices.iter().find(|choice| {
        choice.label.eq_ignore_ascii_case(raw) || value_to_text(&choice.value) == raw
    }) {
        return Ok(choice.value.clone());
    }
    let allowed = choices
        .iter()
        .map(|choice| choice.label.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Err(AnswerParseError::new(
        format!("Choose one of: {}.", allowed),
        Some(format!("allowed values: {}", allowed)),
    ))
}

fn parse_selection(field: &Field, raw: &str) -> Result<Value, AnswerParseError> {
    let entries = raw
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .collect::<Vec<_>>();
    if entries.is_empty() {
        return Err(AnswerParseError::new(
            "Provide at least one choice.",
            None,
        ));
    }
    let values = entries
        .into_iter()
        .map(|entry| parse_choice(field, entry))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::Array(values))
}
