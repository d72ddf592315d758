//! The dynamic field handler set of one content type.

use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::field_types::{AdminFieldView, FieldHandler, FieldTypeRegistry};
use super::submission::Submission;
use super::validation::RuleSet;
use crate::models::{ContentType, Entry};

/// Handlers for every field of a content type, optionally bound to an entry.
#[derive(Debug)]
pub struct ContentFields {
    handlers: Vec<Box<dyn FieldHandler>>,
    entry_id: Option<Uuid>,
}

impl ContentFields {
    /// Build unbound handlers for a content type's fields.
    pub fn for_content_type(content_type: &ContentType, registry: &FieldTypeRegistry) -> Self {
        Self {
            handlers: content_type
                .fields
                .iter()
                .cloned()
                .map(|definition| registry.build(definition))
                .collect(),
            entry_id: None,
        }
    }

    /// Build handlers and, for an existing entry, load its stored values.
    pub async fn load(
        pool: &PgPool,
        content_type: &ContentType,
        registry: &FieldTypeRegistry,
        entry: Option<&Entry>,
    ) -> Result<Self> {
        let mut fields = Self::for_content_type(content_type, registry);

        if let Some(entry) = entry {
            let mut stored = Entry::field_values(pool, entry.id).await?;
            for handler in &mut fields.handlers {
                if let Some(value) = stored.remove(&handler.definition().id) {
                    handler.load(value);
                }
            }
            fields.set_entry(entry.id);
        }

        Ok(fields)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Rules contributed by the fields, keyed by form key.
    pub fn validation_rules(&self) -> RuleSet {
        let mut rules = RuleSet::new();
        for handler in &self.handlers {
            let field_rules = handler.validation_rules();
            if !field_rules.is_empty() {
                rules.set(handler.key(), field_rules);
            }
        }
        rules
    }

    /// Display names of the fields, keyed by form key.
    pub fn attribute_names(&self) -> HashMap<String, String> {
        self.handlers
            .iter()
            .map(|handler| (handler.key().to_string(), handler.attribute_name()))
            .collect()
    }

    /// Bind the set to an entry.
    pub fn set_entry(&mut self, entry_id: Uuid) {
        self.entry_id = Some(entry_id);
    }

    /// Fill every handler from submitted data (or a revision snapshot).
    pub fn fill(&mut self, data: &Submission) {
        for handler in &mut self.handlers {
            handler.fill(data);
        }
    }

    /// Persist every field value of the bound entry.
    pub async fn save(&self, conn: &mut PgConnection) -> Result<()> {
        let entry_id = self
            .entry_id
            .context("content fields are not bound to an entry")?;

        for handler in &self.handlers {
            Entry::save_field_value(
                conn,
                entry_id,
                handler.definition().id,
                &handler.storage_value(),
            )
            .await?;
        }

        Ok(())
    }

    /// Admin form widgets in field order.
    pub fn admin_views(&self) -> Vec<AdminFieldView> {
        self.handlers.iter().map(|h| h.admin_view()).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::validation::Rule;
    use crate::models::FieldDefinition;
    use serde_json::json;

    fn content_type() -> ContentType {
        let type_id = Uuid::now_v7();
        let field = |field_type: &str, short_tag: &str, label: &str, required: bool, sort: i32| {
            FieldDefinition {
                id: Uuid::now_v7(),
                content_type_id: type_id,
                field_type: field_type.to_string(),
                label: label.to_string(),
                short_tag: short_tag.to_string(),
                required,
                options: json!({}),
                sort,
            }
        };

        ContentType {
            id: type_id,
            title: "Article".to_string(),
            short_name: "article".to_string(),
            entries_allowed: None,
            max_revisions: 5,
            dynamic_routing_flag: true,
            admin_entry_view_permission_id: None,
            admin_entry_edit_permission_id: None,
            admin_entry_create_permission_id: None,
            admin_entry_delete_permission_id: None,
            fields: vec![
                field("textarea", "body", "Body", true, 0),
                field("integer", "rating", "Rating", false, 1),
                field("checkbox", "featured", "Featured", false, 2),
            ],
        }
    }

    #[test]
    fn aggregates_rules_and_attribute_names() {
        let fields =
            ContentFields::for_content_type(&content_type(), &FieldTypeRegistry::with_builtins());

        let rules = fields.validation_rules();
        assert_eq!(rules.get("body"), Some(&[Rule::Required][..]));
        assert_eq!(rules.get("rating"), Some(&[Rule::Integer][..]));
        assert_eq!(rules.get("featured"), None);

        let names = fields.attribute_names();
        assert_eq!(names.get("body").map(String::as_str), Some("Body"));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn fill_collects_values_by_key() {
        let mut fields =
            ContentFields::for_content_type(&content_type(), &FieldTypeRegistry::with_builtins());
        fields.fill(&Submission::from_pairs(vec![
            ("body".to_string(), "Hello".to_string()),
            ("rating".to_string(), "4".to_string()),
            ("unrelated".to_string(), "ignored".to_string()),
        ]));

        let values: serde_json::Map<String, serde_json::Value> = fields
            .handlers
            .iter()
            .map(|handler| (handler.key().to_string(), handler.storage_value()))
            .collect();
        assert_eq!(values.get("body"), Some(&json!("Hello")));
        assert_eq!(values.get("rating"), Some(&json!(4)));
        assert_eq!(values.get("featured"), Some(&json!(false)));
        assert!(!values.contains_key("unrelated"));
    }

    #[test]
    fn binding_to_entry() {
        let mut fields =
            ContentFields::for_content_type(&content_type(), &FieldTypeRegistry::with_builtins());
        assert_eq!(fields.entry_id, None);

        let entry_id = Uuid::now_v7();
        fields.set_entry(entry_id);
        assert_eq!(fields.entry_id, Some(entry_id));
        assert_eq!(fields.admin_views().len(), 3);
    }
}
