pub mod field;
pub mod step;
pub mod template;

pub use field::{ChoiceOption, Field, FieldOptions, FieldType, RuleKind, ValidationRule};
pub use step::Step;
pub use template::FormTemplate;
