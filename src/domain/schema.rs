//! Compiles server-supplied field descriptors into a runtime validator.
//!
//! Each descriptor becomes a [`CompiledField`] holding a [`FieldValidator`]:
//! a tagged set of constraints chosen by the field type. The compiled schema
//! is built once per fetched form and evaluated against the live
//! [`FormValues`] after every change.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;

use super::errors::{SchemaError, SchemaResult};
use super::models::{FieldDescriptor, FieldType, FormValue, FormValues, ValidationRule};

/// Violated-rule messages keyed by field name. Valid fields are absent.
pub type ValidationReport = BTreeMap<String, Vec<String>>;

/// A single check applied after the type check of a field.
#[derive(Debug, Clone)]
pub enum Constraint {
    MinLength { limit: usize, message: String },
    MaxLength { limit: usize, message: String },
    Pattern { regex: Regex, message: String },
    MinValue { limit: f64, message: String },
    MaxValue { limit: f64, message: String },
}

impl Constraint {
    fn check_text(&self, text: &str) -> Option<&str> {
        let length = text.chars().count();
        match self {
            Constraint::MinLength { limit, message } if length < *limit => Some(message),
            Constraint::MaxLength { limit, message } if length > *limit => Some(message),
            Constraint::Pattern { regex, message } if !regex.is_match(text) => Some(message),
            _ => None,
        }
    }

    fn check_number(&self, value: f64) -> Option<&str> {
        match self {
            Constraint::MinValue { limit, message } if value < *limit => Some(message),
            Constraint::MaxValue { limit, message } if value > *limit => Some(message),
            _ => None,
        }
    }
}

/// Validation logic for one field, by field type.
#[derive(Debug, Clone)]
pub enum FieldValidator {
    /// `string` and `date` fields.
    Text {
        required: bool,
        constraints: Vec<Constraint>,
    },
    Number {
        required: bool,
        constraints: Vec<Constraint>,
    },
    Checkbox {
        required: bool,
        message: String,
    },
}

/// A descriptor together with its derived label and compiled validator.
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub descriptor: FieldDescriptor,
    pub label: String,
    pub validator: FieldValidator,
}

impl CompiledField {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn field_type(&self) -> FieldType {
        self.descriptor.field_type
    }

    pub fn is_phone(&self) -> bool {
        self.descriptor.is_phone()
    }

    pub fn required(&self) -> bool {
        self.descriptor.required
    }

    /// Returns the messages of every rule `value` violates. Empty means valid.
    pub fn validate(&self, value: &FormValue) -> Vec<String> {
        let label = &self.label;
        match &self.validator {
            FieldValidator::Number { required, constraints } => {
                let number = match value {
                    FormValue::Number(n) if n.is_finite() => *n,
                    value if value.is_blank() => {
                        return if *required {
                            vec![format!("{} should be required", label)]
                        } else {
                            Vec::new()
                        };
                    }
                    _ => return vec![format!("{} should be a number", label)],
                };
                constraints
                    .iter()
                    .filter_map(|c| c.check_number(number))
                    .map(str::to_string)
                    .collect()
            }
            FieldValidator::Text { required, constraints } => {
                let text = match value {
                    FormValue::Text(text) => text.as_str(),
                    FormValue::Empty => "",
                    _ => return vec![format!("{} should be a string", label)],
                };
                if text.is_empty() {
                    return if *required {
                        vec![format!("{} should not be empty", label)]
                    } else {
                        Vec::new()
                    };
                }
                constraints
                    .iter()
                    .filter_map(|c| c.check_text(text))
                    .map(str::to_string)
                    .collect()
            }
            FieldValidator::Checkbox { required, message } => match value {
                FormValue::Bool(true) => Vec::new(),
                _ if *required => vec![message.clone()],
                FormValue::Bool(false) | FormValue::Empty => Vec::new(),
                _ => vec![format!("{} should be checked or unchecked", label)],
            },
        }
    }

    /// Help line listing the field's constraints, as shown under the input.
    pub fn hint(&self) -> String {
        let mut parts = Vec::new();
        for rule in &self.descriptor.validation_rules {
            if let Some(n) = rule.min_length.filter(|n| *n > 0) {
                parts.push(format!("Minimum {} characters", n));
            }
            if let Some(n) = rule.max_length.filter(|n| *n > 0) {
                parts.push(format!("Maximum {} characters", n));
            }
            if let Some(n) = rule.min_value.filter(|n| *n != 0.0) {
                parts.push(format!("Minimum value: {}", n));
            }
            if let Some(n) = rule.max_value.filter(|n| *n != 0.0) {
                parts.push(format!("Maximum value: {}", n));
            }
        }
        if self.required() {
            parts.push("Required".to_string());
        }
        if self.is_phone() {
            parts.push("Format: (xxx) xxx-xxxx".to_string());
        }
        parts.join(" • ")
    }
}

/// The validator for one state's form, in render order.
#[derive(Debug, Clone, Default)]
pub struct CompiledSchema {
    fields: Vec<CompiledField>,
    skipped: Vec<String>,
}

impl CompiledSchema {
    /// Compiles an ordered list of descriptors.
    ///
    /// Descriptors with an unknown type are left out and listed in
    /// [`CompiledSchema::skipped`]. Duplicate names are rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use taxwiz::domain::{CompiledSchema, FieldDescriptor, FieldType, FormValue, FormValues};
    ///
    /// let schema = CompiledSchema::compile(&[
    ///     FieldDescriptor::new("firstName", FieldType::String).required(),
    /// ])
    /// .unwrap();
    ///
    /// let mut values = FormValues::new();
    /// values.insert("firstName".into(), FormValue::Text(String::new()));
    /// let report = schema.validate(&values);
    /// assert_eq!(report["firstName"], vec!["First Name should not be empty"]);
    /// ```
    pub fn compile(descriptors: &[FieldDescriptor]) -> SchemaResult<Self> {
        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(descriptors.len());
        let mut skipped = Vec::new();

        for descriptor in descriptors {
            if !seen.insert(descriptor.name.as_str()) {
                return Err(SchemaError::DuplicateField(descriptor.name.clone()));
            }
            match compile_field(descriptor) {
                Some(field) => fields.push(field),
                None => {
                    tracing::warn!(field = %descriptor.name, "dropping field with unknown type");
                    skipped.push(descriptor.name.clone());
                }
            }
        }

        Ok(Self { fields, skipped })
    }

    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&CompiledField> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Names of descriptors that were dropped because their type is unknown.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validates every compiled field. A field missing from `values` is
    /// treated as unset.
    pub fn validate(&self, values: &FormValues) -> ValidationReport {
        self.fields
            .iter()
            .filter_map(|field| {
                let value = values.get(field.name()).unwrap_or(&FormValue::Empty);
                let messages = field.validate(value);
                (!messages.is_empty()).then(|| (field.name().to_string(), messages))
            })
            .collect()
    }
}

fn compile_field(descriptor: &FieldDescriptor) -> Option<CompiledField> {
    let label = descriptor.label();
    let rules = &descriptor.validation_rules;

    let validator = match descriptor.field_type {
        FieldType::Number => FieldValidator::Number {
            required: descriptor.required,
            constraints: number_constraints(&label, rules),
        },
        FieldType::String | FieldType::Date => FieldValidator::Text {
            required: descriptor.required,
            constraints: text_constraints(&label, rules, descriptor.has_phone_name()),
        },
        FieldType::Checkbox => FieldValidator::Checkbox {
            required: descriptor.required,
            message: rules
                .iter()
                .find_map(|r| r.error_message.clone())
                .unwrap_or_else(|| format!("{} must be checked", label)),
        },
        FieldType::Unknown => return None,
    };

    Some(CompiledField {
        descriptor: descriptor.clone(),
        label,
        validator,
    })
}

fn message(rule: &ValidationRule, default: String) -> String {
    rule.error_message.clone().unwrap_or(default)
}

fn number_constraints(label: &str, rules: &[ValidationRule]) -> Vec<Constraint> {
    let mut constraints = Vec::new();
    for rule in rules {
        if let Some(limit) = rule.min_value {
            constraints.push(Constraint::MinValue {
                limit,
                message: message(rule, format!("{} should be at least {}", label, limit)),
            });
        }
        if let Some(limit) = rule.max_value {
            constraints.push(Constraint::MaxValue {
                limit,
                message: message(rule, format!("{} should be at most {}", label, limit)),
            });
        }
    }
    constraints
}

fn text_constraints(label: &str, rules: &[ValidationRule], phone_named: bool) -> Vec<Constraint> {
    let mut constraints = Vec::new();
    for rule in rules {
        if let Some(limit) = rule.min_length {
            constraints.push(Constraint::MinLength {
                limit,
                message: message(
                    rule,
                    format!("{} should contain at least {} character(s)", label, limit),
                ),
            });
        }
        if let Some(limit) = rule.max_length {
            constraints.push(Constraint::MaxLength {
                limit,
                message: message(
                    rule,
                    format!("{} should contain at most {} character(s)", label, limit),
                ),
            });
        }
        // Phone-named fields are formatted structurally, never pattern-checked.
        if phone_named {
            continue;
        }
        if let Some(pattern) = rule.format.as_deref() {
            match Regex::new(&format!("^(?:{})$", pattern)) {
                Ok(regex) => constraints.push(Constraint::Pattern {
                    regex,
                    message: message(rule, format!("{} should be valid", label)),
                }),
                Err(err) => {
                    tracing::warn!(%pattern, error = %err, "ignoring invalid format pattern");
                }
            }
        }
    }
    constraints
}
