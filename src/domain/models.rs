use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::format::derive_label;

/// A U.S. state as returned by the tax policy service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateData {
    pub state: String,
    pub abbreviation: String,
}

impl StateData {
    pub fn new(state: impl Into<String>, abbreviation: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            abbreviation: abbreviation.into(),
        }
    }

    /// Case-insensitive match against the state name or its abbreviation.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.state.to_lowercase().contains(&query)
            || self.abbreviation.to_lowercase().contains(&query)
    }
}

/// One validation rule attached to a field descriptor.
///
/// Every bound is optional and inclusive. A field carries any number of
/// rules and all of them must pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Input kind of a field descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Date,
    Checkbox,
    /// Any type the compiler does not know how to validate.
    #[serde(other)]
    Unknown,
}

/// Server-supplied description of a single form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub validation_rules: Vec<ValidationRule>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            display_name: None,
            detail: None,
            validation_rules: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_rule(mut self, rule: ValidationRule) -> Self {
        self.validation_rules.push(rule);
        self
    }

    /// Whether the name mentions "phone", in any case. Such text and date
    /// fields never get pattern validation.
    pub fn has_phone_name(&self) -> bool {
        self.name.to_lowercase().contains("phone")
    }

    /// Phone fields are string fields recognised by name. They are formatted
    /// while typing and sent as digits.
    pub fn is_phone(&self) -> bool {
        self.field_type == FieldType::String && self.has_phone_name()
    }

    /// Human label: `displayName` when present, otherwise derived from `name`.
    pub fn label(&self) -> String {
        match self.display_name.as_deref().map(str::trim) {
            Some(display) if !display.is_empty() => display.to_string(),
            _ => derive_label(&self.name),
        }
    }
}

/// Accepts `validationRules` either as a list of rule objects or as a single
/// rule object.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<ValidationRule>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<ValidationRule>),
        One(ValidationRule),
        Null(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(rules) => rules,
        OneOrMany::One(rule) => vec![rule],
        OneOrMany::Null(()) => Vec::new(),
    })
}

/// A state's form: ordered field descriptors plus display text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormTemplate {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl FormTemplate {
    /// Replaces the server text with the title and description shown for `state`.
    pub fn annotated_for(mut self, state: &StateData) -> Self {
        self.title = format!("{} Tax Form", state.state);
        self.description = format!(
            "Complete the {} state tax form with all required information.",
            state.state
        );
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub id: u64,
    pub title: String,
    pub url: String,
}

impl DownloadLink {
    /// Last path segment of the link's URL.
    pub fn file_name(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePdfResponse {
    #[serde(default)]
    pub download_links: Vec<DownloadLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicData {
    #[serde(default)]
    pub states: Vec<StateData>,
}

/// Current value of one form field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    /// The unset sentinel for optional numbers.
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl FormValue {
    pub fn is_blank(&self) -> bool {
        match self {
            FormValue::Empty => true,
            FormValue::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// JSON form of the value; `None` for the unset sentinel.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            FormValue::Empty => None,
            FormValue::Text(text) => Some(Value::String(text.clone())),
            FormValue::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                Some(Value::from(*n as i64))
            }
            FormValue::Number(n) => serde_json::Number::from_f64(*n).map(Value::Number),
            FormValue::Bool(b) => Some(Value::Bool(*b)),
        }
    }
}

impl fmt::Display for FormValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormValue::Empty => Ok(()),
            FormValue::Text(text) => write!(f, "{}", text),
            FormValue::Number(n) => write!(f, "{}", n),
            FormValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Field name to current value.
pub type FormValues = BTreeMap<String, FormValue>;

/// Builds the JSON request body for a set of form values, leaving out unset ones.
pub fn to_payload(values: &FormValues) -> Map<String, Value> {
    values
        .iter()
        .filter_map(|(name, value)| value.to_json().map(|json| (name.clone(), json)))
        .collect()
}

/// The slice of wizard state that survives a restart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedStates {
    #[serde(default)]
    pub states: Vec<StateData>,
    #[serde(default)]
    pub popular_states: Vec<StateData>,
    #[serde(default)]
    pub initialized: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_descriptor_deserializes_rule_list() {
        let descriptor: FieldDescriptor = serde_json::from_value(json!({
            "name": "income",
            "type": "number",
            "required": true,
            "validationRules": [{ "minValue": 0 }, { "maxValue": 1000000, "errorMessage": "Too much" }]
        }))
        .unwrap();

        assert_eq!(descriptor.field_type, FieldType::Number);
        assert!(descriptor.required);
        assert_eq!(descriptor.validation_rules.len(), 2);
        assert_eq!(descriptor.validation_rules[0].min_value, Some(0.0));
        assert_eq!(descriptor.validation_rules[1].error_message.as_deref(), Some("Too much"));
    }

    #[test]
    fn test_descriptor_deserializes_single_rule_object() {
        let descriptor: FieldDescriptor = serde_json::from_value(json!({
            "name": "zipCode",
            "type": "string",
            "required": false,
            "validationRules": { "format": "\\d{5}" }
        }))
        .unwrap();

        assert_eq!(descriptor.validation_rules.len(), 1);
        assert_eq!(descriptor.validation_rules[0].format.as_deref(), Some("\\d{5}"));
    }

    #[test]
    fn test_descriptor_missing_or_null_rules() {
        let missing: FieldDescriptor =
            serde_json::from_value(json!({ "name": "a", "type": "date" })).unwrap();
        let null: FieldDescriptor =
            serde_json::from_value(json!({ "name": "b", "type": "date", "validationRules": null }))
                .unwrap();

        assert!(missing.validation_rules.is_empty());
        assert!(!missing.required);
        assert!(null.validation_rules.is_empty());
    }

    #[test]
    fn test_unknown_field_type() {
        let descriptor: FieldDescriptor =
            serde_json::from_value(json!({ "name": "x", "type": "signature" })).unwrap();
        assert_eq!(descriptor.field_type, FieldType::Unknown);
    }

    #[test]
    fn test_label_prefers_display_name() {
        let plain = FieldDescriptor::new("firstName", FieldType::String);
        let named = FieldDescriptor::new("ssn", FieldType::String).with_display_name("Social Security Number");
        let blank = FieldDescriptor::new("ssn", FieldType::String).with_display_name("  ");

        assert_eq!(plain.label(), "First Name");
        assert_eq!(named.label(), "Social Security Number");
        assert_eq!(blank.label(), "Ssn");
    }

    #[test]
    fn test_is_phone() {
        assert!(FieldDescriptor::new("phoneNumber", FieldType::String).is_phone());
        assert!(FieldDescriptor::new("homePHONE", FieldType::String).is_phone());
        assert!(!FieldDescriptor::new("phoneCount", FieldType::Number).is_phone());
        assert!(!FieldDescriptor::new("email", FieldType::String).is_phone());
        assert!(!FieldDescriptor::new("phoneVerifiedOn", FieldType::Date).is_phone());
        assert!(FieldDescriptor::new("phoneVerifiedOn", FieldType::Date).has_phone_name());
    }

    #[test]
    fn test_state_matches() {
        let state = StateData::new("California", "CA");
        assert!(state.matches("cal"));
        assert!(state.matches("ca"));
        assert!(state.matches("FORN"));
        assert!(!state.matches("tx"));
    }

    #[test]
    fn test_annotated_template() {
        let template = FormTemplate {
            title: "server".into(),
            description: "server".into(),
            fields: vec![FieldDescriptor::new("a", FieldType::String)],
        }
        .annotated_for(&StateData::new("Texas", "TX"));

        assert_eq!(template.title, "Texas Tax Form");
        assert_eq!(
            template.description,
            "Complete the Texas state tax form with all required information."
        );
        assert_eq!(template.fields.len(), 1);
    }

    #[test]
    fn test_download_link_file_name() {
        let link = DownloadLink { id: 1, title: "Form".into(), url: "/files/ca/form-540.pdf".into() };
        assert_eq!(link.file_name(), "form-540.pdf");
    }

    #[test]
    fn test_payload_skips_unset_and_keeps_integers() {
        let mut values = FormValues::new();
        values.insert("name".into(), FormValue::Text("Ada".into()));
        values.insert("dependents".into(), FormValue::Number(2.0));
        values.insert("rate".into(), FormValue::Number(0.5));
        values.insert("bonus".into(), FormValue::Empty);
        values.insert("agree".into(), FormValue::Bool(true));

        let payload = to_payload(&values);

        assert_eq!(
            Value::Object(payload),
            json!({ "name": "Ada", "dependents": 2, "rate": 0.5, "agree": true })
        );
    }

    #[test]
    fn test_generate_pdf_response_defaults() {
        let response: GeneratePdfResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.download_links.is_empty());

        let response: GeneratePdfResponse = serde_json::from_value(json!({
            "downloadLinks": [{ "id": 7, "title": "Return", "url": "/a/b.pdf" }]
        }))
        .unwrap();
        assert_eq!(response.download_links[0].id, 7);
    }
}
