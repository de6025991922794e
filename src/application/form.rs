//! Live form state bridging the compiled schema and user input.
//!
//! [`FormController`] owns one value per compiled field, the text buffers
//! the user edits, and the validation messages produced after every change.
//! Phone fields are reformatted on each keystroke; the matching caret
//! correction is queued and applied by [`FormController::run_deferred`]
//! once the current update has been handled.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::domain::{
    CompiledField, CompiledSchema, FieldType, FormValue, FormValues, ValidationReport,
    format_phone_number, unformat_phone_number,
};

/// Editable text with a caret, measured in characters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputBuffer {
    text: String,
    cursor: usize,
}

impl InputBuffer {
    /// Creates a buffer with the caret at the end.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let cursor = text.chars().count();
        Self { text, cursor }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn set(&mut self, text: String, cursor: usize) {
        self.text = text;
        self.cursor = cursor.min(self.len());
    }

    fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.len());
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.text
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.text.len())
    }

    /// Text and caret after inserting `c` at the caret.
    pub fn with_inserted(&self, c: char) -> (String, usize) {
        let mut text = self.text.clone();
        text.insert(self.byte_index(self.cursor), c);
        (text, self.cursor + 1)
    }

    /// Text and caret after removing the character at `index`.
    fn with_removed(&self, index: usize) -> (String, usize) {
        let mut text = self.text.clone();
        text.remove(self.byte_index(index));
        (text, index)
    }

    pub fn with_backspace(&self) -> Option<(String, usize)> {
        (self.cursor > 0).then(|| self.with_removed(self.cursor - 1))
    }

    pub fn with_delete(&self) -> Option<(String, usize)> {
        (self.cursor < self.len()).then(|| self.with_removed(self.cursor))
    }

    /// Like [`InputBuffer::with_backspace`] but removes the nearest digit left
    /// of the caret, skipping formatting punctuation.
    fn with_digit_backspace(&self) -> Option<(String, usize)> {
        let index = self
            .text
            .chars()
            .take(self.cursor)
            .enumerate()
            .filter(|(_, c)| c.is_ascii_digit())
            .map(|(i, _)| i)
            .last()?;
        Some(self.with_removed(index))
    }
}

/// Caret movement within the focused input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorMove {
    Left,
    Right,
    Home,
    End,
}

/// A caret correction to apply after the current update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorFixup {
    pub field: String,
    pub position: usize,
}

/// Holds the values of one form and validates them on every change.
#[derive(Debug, Clone)]
pub struct FormController {
    schema: CompiledSchema,
    values: FormValues,
    inputs: HashMap<String, InputBuffer>,
    errors: ValidationReport,
    touched: HashSet<String>,
    submit_attempted: bool,
    deferred: VecDeque<CursorFixup>,
}

impl FormController {
    /// Creates the controller, filling every field missing from `defaults`
    /// with its empty value. Phone defaults are formatted immediately.
    pub fn new(schema: CompiledSchema, defaults: &FormValues) -> Self {
        let mut values = FormValues::new();
        let mut inputs = HashMap::new();

        for field in schema.fields() {
            let mut value = defaults
                .get(field.name())
                .cloned()
                .unwrap_or_else(|| empty_value(field));
            if field.is_phone() {
                if let FormValue::Text(text) = &value {
                    if !text.is_empty() {
                        value = FormValue::Text(format_phone_number(text));
                    }
                }
            }
            if field.field_type() != FieldType::Checkbox {
                inputs.insert(field.name().to_string(), InputBuffer::new(value.to_string()));
            }
            values.insert(field.name().to_string(), value);
        }

        let errors = schema.validate(&values);
        Self {
            schema,
            values,
            inputs,
            errors,
            touched: HashSet::new(),
            submit_attempted: false,
            deferred: VecDeque::new(),
        }
    }

    pub fn fields(&self) -> &[CompiledField] {
        self.schema.fields()
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.schema
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn value(&self, name: &str) -> Option<&FormValue> {
        self.values.get(name)
    }

    pub fn input(&self, name: &str) -> Option<&InputBuffer> {
        self.inputs.get(name)
    }

    /// Every current violation of `name`, shown or not.
    pub fn errors_for(&self, name: &str) -> &[String] {
        self.errors.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Violations to display: only for fields the user changed, or for all
    /// fields once a submit has been attempted.
    pub fn visible_errors(&self, name: &str) -> &[String] {
        if self.submit_attempted || self.touched.contains(name) {
            self.errors_for(name)
        } else {
            &[]
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_pending_fixups(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Whether the input control of `name` accepts the character `c`.
    /// Number inputs take digits, a decimal point and a minus sign only.
    pub fn accepts(&self, name: &str, c: char) -> bool {
        match self.schema.field(name).map(CompiledField::field_type) {
            Some(FieldType::Number) => c.is_ascii_digit() || c == '.' || c == '-',
            Some(FieldType::Checkbox) | None => false,
            Some(_) => !c.is_control(),
        }
    }

    /// Applies a new raw input text for `name`, with the caret where the
    /// edit left it. Returns `false` if the field takes no text input.
    pub fn handle_change(&mut self, name: &str, raw: &str, cursor: usize) -> bool {
        let Some(field) = self.schema.field(name) else {
            return false;
        };
        let Some(buffer) = self.inputs.get_mut(name) else {
            return false;
        };

        let value = match field.field_type() {
            FieldType::String if field.is_phone() => {
                let formatted = format_phone_number(raw);
                let delta = formatted.chars().count() as isize - raw.chars().count() as isize;
                let position = (cursor as isize + delta).max(0) as usize;
                buffer.set(formatted.clone(), cursor);
                self.deferred.push_back(CursorFixup {
                    field: name.to_string(),
                    position,
                });
                FormValue::Text(formatted)
            }
            FieldType::Number => {
                buffer.set(raw.to_string(), cursor);
                if raw.is_empty() {
                    FormValue::Empty
                } else {
                    raw.parse::<f64>()
                        .map(FormValue::Number)
                        .unwrap_or_else(|_| FormValue::Text(raw.to_string()))
                }
            }
            FieldType::String | FieldType::Date => {
                buffer.set(raw.to_string(), cursor);
                FormValue::Text(raw.to_string())
            }
            FieldType::Checkbox | FieldType::Unknown => return false,
        };

        self.values.insert(name.to_string(), value);
        self.touch(name);
        true
    }

    pub fn insert_char(&mut self, name: &str, c: char) -> bool {
        if !self.accepts(name, c) {
            return false;
        }
        match self.inputs.get(name).map(|buffer| buffer.with_inserted(c)) {
            Some((text, cursor)) => self.handle_change(name, &text, cursor),
            None => false,
        }
    }

    pub fn backspace(&mut self, name: &str) -> bool {
        let is_phone = self.schema.field(name).is_some_and(CompiledField::is_phone);
        let edit = self.inputs.get(name).and_then(|buffer| {
            if is_phone {
                buffer.with_digit_backspace()
            } else {
                buffer.with_backspace()
            }
        });
        match edit {
            Some((text, cursor)) => self.handle_change(name, &text, cursor),
            None => false,
        }
    }

    pub fn delete(&mut self, name: &str) -> bool {
        match self.inputs.get(name).and_then(InputBuffer::with_delete) {
            Some((text, cursor)) => self.handle_change(name, &text, cursor),
            None => false,
        }
    }

    pub fn move_cursor(&mut self, name: &str, movement: CursorMove) {
        if let Some(buffer) = self.inputs.get_mut(name) {
            let target = match movement {
                CursorMove::Left => buffer.cursor.saturating_sub(1),
                CursorMove::Right => buffer.cursor + 1,
                CursorMove::Home => 0,
                CursorMove::End => buffer.len(),
            };
            buffer.set_cursor(target);
        }
    }

    pub fn set_checkbox(&mut self, name: &str, checked: bool) -> bool {
        match self.schema.field(name).map(CompiledField::field_type) {
            Some(FieldType::Checkbox) => {
                self.values.insert(name.to_string(), FormValue::Bool(checked));
                self.touch(name);
                true
            }
            _ => false,
        }
    }

    pub fn toggle_checkbox(&mut self, name: &str) -> bool {
        let checked = matches!(self.values.get(name), Some(FormValue::Bool(true)));
        self.set_checkbox(name, !checked)
    }

    /// Applies queued caret corrections. Called once the current input event
    /// has been handled and before the next one is read.
    pub fn run_deferred(&mut self) -> usize {
        let mut applied = 0;
        while let Some(fixup) = self.deferred.pop_front() {
            // The field may have gone away since the fixup was queued.
            if let Some(buffer) = self.inputs.get_mut(&fixup.field) {
                buffer.set_cursor(fixup.position);
                applied += 1;
            }
        }
        applied
    }

    /// Validates everything and returns the sanitized values, with phone
    /// numbers reduced to digits. Nothing is returned while any field fails.
    pub fn submit(&mut self) -> Result<FormValues, ValidationReport> {
        self.submit_attempted = true;
        self.errors = self.schema.validate(&self.values);
        if !self.errors.is_empty() {
            tracing::debug!(invalid = self.errors.len(), "submission blocked by validation");
            return Err(self.errors.clone());
        }

        let mut sanitized = self.values.clone();
        for field in self.schema.fields().iter().filter(|f| f.is_phone()) {
            if let Some(FormValue::Text(text)) = sanitized.get_mut(field.name()) {
                if !text.is_empty() {
                    *text = unformat_phone_number(text);
                }
            }
        }
        Ok(sanitized)
    }

    fn touch(&mut self, name: &str) {
        self.touched.insert(name.to_string());
        self.errors = self.schema.validate(&self.values);
    }
}

fn empty_value(field: &CompiledField) -> FormValue {
    match field.field_type() {
        FieldType::Number if field.required() => FormValue::Number(0.0),
        FieldType::Number => FormValue::Empty,
        FieldType::Checkbox => FormValue::Bool(false),
        FieldType::String | FieldType::Date | FieldType::Unknown => FormValue::Text(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldDescriptor, ValidationRule};

    fn schema(fields: Vec<FieldDescriptor>) -> CompiledSchema {
        CompiledSchema::compile(&fields).unwrap()
    }

    fn phone_form() -> FormController {
        FormController::new(
            schema(vec![FieldDescriptor::new("phoneNumber", FieldType::String)
                .required()
                .with_rule(ValidationRule { min_length: Some(10), ..ValidationRule::default() })]),
            &FormValues::new(),
        )
    }

    fn type_text(form: &mut FormController, name: &str, text: &str) {
        for c in text.chars() {
            form.insert_char(name, c);
            form.run_deferred();
        }
    }

    #[test]
    fn test_every_field_gets_an_initial_value() {
        let form = FormController::new(
            schema(vec![
                FieldDescriptor::new("firstName", FieldType::String),
                FieldDescriptor::new("birthDate", FieldType::Date),
                FieldDescriptor::new("income", FieldType::Number).required(),
                FieldDescriptor::new("bonus", FieldType::Number),
                FieldDescriptor::new("agree", FieldType::Checkbox),
            ]),
            &FormValues::new(),
        );

        assert_eq!(form.value("firstName"), Some(&FormValue::Text(String::new())));
        assert_eq!(form.value("birthDate"), Some(&FormValue::Text(String::new())));
        assert_eq!(form.value("income"), Some(&FormValue::Number(0.0)));
        assert_eq!(form.value("bonus"), Some(&FormValue::Empty));
        assert_eq!(form.value("agree"), Some(&FormValue::Bool(false)));
        assert_eq!(form.values().len(), 5);
        assert_eq!(form.input("income").unwrap().text(), "0");
        assert!(form.input("agree").is_none());
    }

    #[test]
    fn test_defaults_are_kept_and_phone_defaults_formatted() {
        let defaults = FormValues::from([
            ("firstName".to_string(), FormValue::Text("Ada".into())),
            ("phoneNumber".to_string(), FormValue::Text("5551234567".into())),
        ]);
        let form = FormController::new(
            schema(vec![
                FieldDescriptor::new("firstName", FieldType::String),
                FieldDescriptor::new("phoneNumber", FieldType::String),
            ]),
            &defaults,
        );

        assert_eq!(form.value("firstName"), Some(&FormValue::Text("Ada".into())));
        assert_eq!(form.value("phoneNumber"), Some(&FormValue::Text("(555) 123-4567".into())));
        assert_eq!(form.input("phoneNumber").unwrap().text(), "(555) 123-4567");
        assert_eq!(form.input("phoneNumber").unwrap().cursor(), 14);
    }

    #[test]
    fn test_phone_typing_formats_and_submits_digits() {
        let mut form = phone_form();
        type_text(&mut form, "phoneNumber", "1234567890");

        assert_eq!(form.value("phoneNumber"), Some(&FormValue::Text("(123) 456-7890".into())));
        assert_eq!(form.input("phoneNumber").unwrap().cursor(), 14);

        let payload = form.submit().unwrap();
        assert_eq!(payload["phoneNumber"], FormValue::Text("1234567890".into()));
        // The displayed value keeps its formatting.
        assert_eq!(form.value("phoneNumber"), Some(&FormValue::Text("(123) 456-7890".into())));
    }

    #[test]
    fn test_phone_cursor_fixup_is_deferred() {
        let mut form = phone_form();
        type_text(&mut form, "phoneNumber", "123");
        assert_eq!(form.input("phoneNumber").unwrap().text(), "(123)");
        assert_eq!(form.input("phoneNumber").unwrap().cursor(), 5);

        // The fourth digit adds a space; the caret catches up on the next tick.
        form.insert_char("phoneNumber", '4');
        assert!(form.has_pending_fixups());
        assert_eq!(form.input("phoneNumber").unwrap().text(), "(123) 4");
        assert_eq!(form.input("phoneNumber").unwrap().cursor(), 6);

        assert_eq!(form.run_deferred(), 1);
        assert_eq!(form.input("phoneNumber").unwrap().cursor(), 7);
        assert!(!form.has_pending_fixups());
    }

    #[test]
    fn test_phone_cursor_adjusts_for_inserted_punctuation() {
        let mut form = phone_form();
        form.handle_change("phoneNumber", "1234", 4);
        form.run_deferred();

        assert_eq!(form.input("phoneNumber").unwrap().text(), "(123) 4");
        assert_eq!(form.input("phoneNumber").unwrap().cursor(), 7);
    }

    #[test]
    fn test_phone_edit_in_the_middle_keeps_caret() {
        let mut form = phone_form();
        type_text(&mut form, "phoneNumber", "1234567");
        assert_eq!(form.input("phoneNumber").unwrap().text(), "(123) 456-7");

        form.move_cursor("phoneNumber", CursorMove::Home);
        for _ in 0..3 {
            form.move_cursor("phoneNumber", CursorMove::Right);
        }
        form.insert_char("phoneNumber", '9');
        form.run_deferred();

        assert_eq!(form.input("phoneNumber").unwrap().text(), "(129) 345-67");
        assert_eq!(form.input("phoneNumber").unwrap().cursor(), 4);
    }

    #[test]
    fn test_phone_backspace_skips_punctuation() {
        let mut form = phone_form();
        type_text(&mut form, "phoneNumber", "123");
        form.move_cursor("phoneNumber", CursorMove::End);

        form.backspace("phoneNumber");
        form.run_deferred();

        assert_eq!(form.input("phoneNumber").unwrap().text(), "(12)");
        assert_eq!(form.input("phoneNumber").unwrap().cursor(), 3);
    }

    #[test]
    fn test_phone_cleared_completely() {
        let mut form = phone_form();
        type_text(&mut form, "phoneNumber", "1");
        form.move_cursor("phoneNumber", CursorMove::End);
        form.backspace("phoneNumber");
        form.run_deferred();

        assert_eq!(form.value("phoneNumber"), Some(&FormValue::Text(String::new())));
        assert_eq!(form.input("phoneNumber").unwrap().cursor(), 0);
        assert_eq!(form.visible_errors("phoneNumber"), ["Phone Number should not be empty"]);
    }

    #[test]
    fn test_number_input_coercion() {
        let mut form = FormController::new(
            schema(vec![FieldDescriptor::new("bonus", FieldType::Number)
                .with_rule(ValidationRule { max_value: Some(100.0), ..ValidationRule::default() })]),
            &FormValues::new(),
        );

        assert!(!form.insert_char("bonus", 'x'));
        type_text(&mut form, "bonus", "150");
        assert_eq!(form.value("bonus"), Some(&FormValue::Number(150.0)));
        assert_eq!(form.visible_errors("bonus"), ["Bonus should be at most 100"]);

        for _ in 0..3 {
            form.backspace("bonus");
        }
        assert_eq!(form.value("bonus"), Some(&FormValue::Empty));
        assert!(form.is_valid());

        type_text(&mut form, "bonus", "-");
        assert_eq!(form.value("bonus"), Some(&FormValue::Text("-".into())));
        assert_eq!(form.visible_errors("bonus"), ["Bonus should be a number"]);
    }

    #[test]
    fn test_errors_hidden_until_touched_or_submitted() {
        let mut form = FormController::new(
            schema(vec![
                FieldDescriptor::new("firstName", FieldType::String).required(),
                FieldDescriptor::new("lastName", FieldType::String).required(),
            ]),
            &FormValues::new(),
        );

        assert!(!form.is_valid());
        assert!(form.visible_errors("firstName").is_empty());

        type_text(&mut form, "firstName", "A");
        form.backspace("firstName");
        assert_eq!(form.visible_errors("firstName"), ["First Name should not be empty"]);
        assert!(form.visible_errors("lastName").is_empty());

        let report = form.submit().unwrap_err();
        assert_eq!(report.len(), 2);
        assert_eq!(form.visible_errors("lastName"), ["Last Name should not be empty"]);
    }

    #[test]
    fn test_checkbox_toggle() {
        let mut form = FormController::new(
            schema(vec![FieldDescriptor::new("agreeToTerms", FieldType::Checkbox).required()]),
            &FormValues::new(),
        );

        assert!(form.submit().is_err());
        assert!(form.toggle_checkbox("agreeToTerms"));
        assert_eq!(form.value("agreeToTerms"), Some(&FormValue::Bool(true)));
        assert_eq!(form.submit().unwrap()["agreeToTerms"], FormValue::Bool(true));
        assert!(!form.insert_char("agreeToTerms", 'x'));
        assert!(!form.handle_change("agreeToTerms", "true", 4));
    }

    #[test]
    fn test_unicode_editing() {
        let mut form = FormController::new(
            schema(vec![FieldDescriptor::new("city", FieldType::String)]),
            &FormValues::from([("city".to_string(), FormValue::Text("Zürich".into()))]),
        );

        form.backspace("city");
        assert_eq!(form.input("city").unwrap().text(), "Züric");
        form.move_cursor("city", CursorMove::Home);
        form.delete("city");
        assert_eq!(form.value("city"), Some(&FormValue::Text("üric".into())));
    }

    #[test]
    fn test_unknown_field_is_ignored() {
        let mut form = phone_form();
        assert!(!form.handle_change("nope", "x", 1));
        assert!(!form.set_checkbox("phoneNumber", true));
    }
}
