//! Dynamic field types.
//!
//! Every field type implements [`FieldHandler`]; the [`FieldTypeRegistry`]
//! maps the field-type identifier stored on a content type field to the
//! constructor of its handler.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::submission::Submission;
use super::validation::Rule;
use crate::models::FieldDefinition;

/// Default `max_length` of single-line text fields.
const DEFAULT_TEXT_MAX_LENGTH: usize = 255;

/// Renderer-neutral description of a field's admin form widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminFieldView {
    pub field_id: uuid::Uuid,
    pub key: String,
    pub label: String,
    pub widget: &'static str,
    pub required: bool,
    pub value: Value,
    /// `(value, label)` pairs for choice widgets.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<(String, String)>,
}

/// Capability interface of one dynamic field bound to an entry.
pub trait FieldHandler: Send + Sync + std::fmt::Debug {
    fn definition(&self) -> &FieldDefinition;

    /// Current value as submitted or loaded.
    fn value(&self) -> &Value;

    /// Take this field's value from submitted data.
    fn fill(&mut self, data: &Submission);

    /// Restore a value previously returned by [`FieldHandler::storage_value`].
    fn load(&mut self, stored: Value);

    /// Normalised value written to storage.
    fn storage_value(&self) -> Value;

    /// Widget identifier for the admin form.
    fn widget(&self) -> &'static str;

    /// Type-specific rules; `Required` is added by [`FieldHandler::validation_rules`].
    fn type_rules(&self) -> Vec<Rule> {
        Vec::new()
    }

    /// Form key of this field.
    fn key(&self) -> &str {
        &self.definition().short_tag
    }

    /// Name used for this field in validation messages.
    fn attribute_name(&self) -> String {
        self.definition().label.clone()
    }

    fn validation_rules(&self) -> Vec<Rule> {
        let mut rules = Vec::new();
        if self.definition().required {
            rules.push(Rule::Required);
        }
        rules.extend(self.type_rules());
        rules
    }

    fn choices(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn admin_view(&self) -> AdminFieldView {
        let definition = self.definition();
        AdminFieldView {
            field_id: definition.id,
            key: definition.short_tag.clone(),
            label: definition.label.clone(),
            widget: self.widget(),
            required: definition.required,
            value: self.storage_value(),
            options: self.choices(),
        }
    }
}

/// Accessors shared by every built-in handler.
macro_rules! field_state {
    () => {
        fn definition(&self) -> &FieldDefinition {
            &self.definition
        }

        fn value(&self) -> &Value {
            &self.value
        }

        fn load(&mut self, stored: Value) {
            self.value = stored;
        }
    };
}

/// Single-line text.
#[derive(Debug)]
pub struct TextField {
    definition: FieldDefinition,
    value: Value,
}

impl FieldHandler for TextField {
    field_state!();

    fn fill(&mut self, data: &Submission) {
        self.value = text_value(data, self.key());
    }

    fn storage_value(&self) -> Value {
        self.value.clone()
    }

    fn widget(&self) -> &'static str {
        "text"
    }

    fn type_rules(&self) -> Vec<Rule> {
        let max = self
            .definition
            .options
            .get("max_length")
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_TEXT_MAX_LENGTH);
        vec![Rule::Max(max)]
    }
}

/// Multi-line text.
#[derive(Debug)]
pub struct TextareaField {
    definition: FieldDefinition,
    value: Value,
}

impl FieldHandler for TextareaField {
    field_state!();

    fn fill(&mut self, data: &Submission) {
        self.value = text_value(data, self.key());
    }

    fn storage_value(&self) -> Value {
        self.value.clone()
    }

    fn widget(&self) -> &'static str {
        "textarea"
    }
}

/// Whole number, stored as a JSON number.
#[derive(Debug)]
pub struct IntegerField {
    definition: FieldDefinition,
    value: Value,
}

impl FieldHandler for IntegerField {
    field_state!();

    fn fill(&mut self, data: &Submission) {
        self.value = text_value(data, self.key());
    }

    fn storage_value(&self) -> Value {
        match &self.value {
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or(Value::Null),
            Value::Number(n) => Value::Number(n.clone()),
            _ => Value::Null,
        }
    }

    fn widget(&self) -> &'static str {
        "number"
    }

    fn type_rules(&self) -> Vec<Rule> {
        vec![Rule::Integer]
    }
}

/// On/off flag. An unchecked box is absent from the submission.
#[derive(Debug)]
pub struct CheckboxField {
    definition: FieldDefinition,
    value: Value,
}

impl FieldHandler for CheckboxField {
    field_state!();

    fn fill(&mut self, data: &Submission) {
        self.value = Value::Bool(data.flag(self.key()));
    }

    fn storage_value(&self) -> Value {
        Value::Bool(match &self.value {
            Value::Bool(b) => *b,
            Value::String(s) => !s.is_empty() && s != "0",
            _ => false,
        })
    }

    fn widget(&self) -> &'static str {
        "checkbox"
    }
}

/// Single choice from `options.options`.
#[derive(Debug)]
pub struct DropdownField {
    definition: FieldDefinition,
    value: Value,
}

impl FieldHandler for DropdownField {
    field_state!();

    fn fill(&mut self, data: &Submission) {
        self.value = text_value(data, self.key());
    }

    fn storage_value(&self) -> Value {
        self.value.clone()
    }

    fn widget(&self) -> &'static str {
        "select"
    }

    fn type_rules(&self) -> Vec<Rule> {
        vec![Rule::In(
            self.choices().into_iter().map(|(value, _)| value).collect(),
        )]
    }

    /// Options are either plain strings or `{"value": .., "label": ..}`.
    fn choices(&self) -> Vec<(String, String)> {
        self.definition
            .options
            .get("options")
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .filter_map(|option| match option {
                        Value::String(s) => Some((s.clone(), s.clone())),
                        Value::Object(map) => {
                            let value = map.get("value")?.as_str()?.to_string();
                            let label = map
                                .get("label")
                                .and_then(Value::as_str)
                                .map(str::to_string)
                                .unwrap_or_else(|| value.clone());
                            Some((value, label))
                        }
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Calendar date (`YYYY-MM-DD`).
#[derive(Debug)]
pub struct DateField {
    definition: FieldDefinition,
    value: Value,
}

impl FieldHandler for DateField {
    field_state!();

    fn fill(&mut self, data: &Submission) {
        self.value = text_value(data, self.key());
    }

    fn storage_value(&self) -> Value {
        self.value.clone()
    }

    fn widget(&self) -> &'static str {
        "date"
    }

    fn type_rules(&self) -> Vec<Rule> {
        vec![Rule::Date]
    }
}

/// Submitted string for `key`, trimmed; blank becomes `null`.
fn text_value(data: &Submission, key: &str) -> Value {
    data.non_blank(key)
        .map(|s| Value::String(s.to_string()))
        .unwrap_or(Value::Null)
}

/// Constructor of a field handler.
pub type FieldFactory = fn(FieldDefinition) -> Box<dyn FieldHandler>;

/// Field-type identifier used when a stored identifier is unknown.
pub const FALLBACK_FIELD_TYPE: &str = "text";

/// Registry of field types keyed by identifier.
#[derive(Clone)]
pub struct FieldTypeRegistry {
    factories: HashMap<&'static str, FieldFactory>,
}

impl FieldTypeRegistry {
    /// Registry with no field types.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in field types.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("text", |definition| {
            Box::new(TextField {
                definition,
                value: Value::Null,
            })
        });
        registry.register("textarea", |definition| {
            Box::new(TextareaField {
                definition,
                value: Value::Null,
            })
        });
        registry.register("integer", |definition| {
            Box::new(IntegerField {
                definition,
                value: Value::Null,
            })
        });
        registry.register("checkbox", |definition| {
            Box::new(CheckboxField {
                definition,
                value: Value::Bool(false),
            })
        });
        registry.register("dropdown", |definition| {
            Box::new(DropdownField {
                definition,
                value: Value::Null,
            })
        });
        registry.register("date", |definition| {
            Box::new(DateField {
                definition,
                value: Value::Null,
            })
        });
        registry
    }

    pub fn register(&mut self, field_type: &'static str, factory: FieldFactory) {
        self.factories.insert(field_type, factory);
    }

    pub fn contains(&self, field_type: &str) -> bool {
        self.factories.contains_key(field_type)
    }

    /// Sorted list of registered identifiers.
    pub fn field_types(&self) -> Vec<&'static str> {
        let mut types: Vec<&'static str> = self.factories.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Build the handler for a field definition.
    ///
    /// Unknown identifiers fall back to a text field.
    pub fn build(&self, definition: FieldDefinition) -> Box<dyn FieldHandler> {
        if let Some(factory) = self.factories.get(definition.field_type.as_str()) {
            return factory(definition);
        }

        warn!(
            field_type = %definition.field_type,
            field = %definition.short_tag,
            "unknown field type, treating as text"
        );
        Box::new(TextField {
            definition,
            value: Value::Null,
        })
    }
}

impl Default for FieldTypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for FieldTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldTypeRegistry")
            .field("field_types", &self.field_types())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn definition(field_type: &str, short_tag: &str, required: bool, options: Value) -> FieldDefinition {
        FieldDefinition {
            id: Uuid::now_v7(),
            content_type_id: Uuid::nil(),
            field_type: field_type.to_string(),
            label: short_tag.to_uppercase(),
            short_tag: short_tag.to_string(),
            required,
            options,
            sort: 0,
        }
    }

    fn submission(items: &[(&str, &str)]) -> Submission {
        Submission::from_pairs(items.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn builtins_are_registered() {
        let registry = FieldTypeRegistry::with_builtins();
        assert_eq!(
            registry.field_types(),
            vec!["checkbox", "date", "dropdown", "integer", "text", "textarea"]
        );
    }

    #[test]
    fn unknown_type_falls_back_to_text() {
        let registry = FieldTypeRegistry::with_builtins();
        let handler = registry.build(definition("mystery", "body", false, json!({})));
        assert_eq!(handler.widget(), "text");
        assert!(!registry.contains("mystery"));
    }

    #[test]
    fn text_rules_include_required_and_max_length() {
        let registry = FieldTypeRegistry::with_builtins();
        let handler = registry.build(definition("text", "summary", true, json!({"max_length": 40})));
        assert_eq!(handler.validation_rules(), vec![Rule::Required, Rule::Max(40)]);

        let optional = registry.build(definition("text", "summary", false, json!({})));
        assert_eq!(optional.validation_rules(), vec![Rule::Max(DEFAULT_TEXT_MAX_LENGTH)]);
    }

    #[test]
    fn integer_normalises_to_number() {
        let registry = FieldTypeRegistry::with_builtins();
        let mut handler = registry.build(definition("integer", "count", false, json!({})));

        handler.fill(&submission(&[("count", " 42 ")]));
        assert_eq!(handler.storage_value(), json!(42));

        handler.fill(&submission(&[]));
        assert_eq!(handler.storage_value(), Value::Null);
    }

    #[test]
    fn checkbox_absent_means_unchecked() {
        let registry = FieldTypeRegistry::with_builtins();
        let mut handler = registry.build(definition("checkbox", "featured", false, json!({})));

        handler.fill(&submission(&[("featured", "1")]));
        assert_eq!(handler.storage_value(), json!(true));

        handler.fill(&submission(&[]));
        assert_eq!(handler.storage_value(), json!(false));
    }

    #[test]
    fn dropdown_choices_and_rule() {
        let registry = FieldTypeRegistry::with_builtins();
        let handler = registry.build(definition(
            "dropdown",
            "color",
            false,
            json!({"options": ["red", {"value": "blue", "label": "Blue"}, 7]}),
        ));

        let view = handler.admin_view();
        assert_eq!(view.widget, "select");
        assert_eq!(
            view.options,
            vec![
                ("red".to_string(), "red".to_string()),
                ("blue".to_string(), "Blue".to_string()),
            ]
        );
        assert_eq!(
            handler.validation_rules(),
            vec![Rule::In(vec!["red".to_string(), "blue".to_string()])]
        );
    }

    #[test]
    fn load_restores_stored_value_for_admin_view() {
        let registry = FieldTypeRegistry::with_builtins();
        let mut handler = registry.build(definition("textarea", "body", true, json!({})));
        handler.load(json!("Stored body"));

        let view = handler.admin_view();
        assert_eq!(view.key, "body");
        assert_eq!(view.label, "BODY");
        assert!(view.required);
        assert_eq!(view.value, json!("Stored body"));
    }
}
