//! Form validation rules.
//!
//! A [`RuleSet`] maps form keys to an ordered list of [`Rule`]s. The
//! [`Validator`] evaluates them against a [`Submission`] and produces
//! human-readable messages using the attribute names supplied by the
//! dynamic field handlers.

use std::collections::HashMap;
use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::created_at::{self, CREATED_AT_FORMAT_HINT};
use super::submission::{Submission, is_empty_value};
use crate::models::Entry;

/// Maximum length of a `url_title`.
pub const URL_TITLE_MAX_LENGTH: usize = 255;

/// Maximum length of `title` and `meta_title` (`VARCHAR(255)` columns).
pub const TITLE_MAX_LENGTH: usize = 255;

#[allow(clippy::expect_used)]
static ALPHA_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\p{L}\p{M}\p{N}_-]+$").expect("valid alpha_dash pattern"));

/// A single constraint on a form value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// Value must be present and non-blank.
    Required,
    /// Letters, digits, dashes and underscores only.
    AlphaDash,
    /// At most `n` characters.
    Max(usize),
    Integer,
    /// Calendar date as `YYYY-MM-DD`.
    Date,
    /// The `created_at` form format.
    CreatedAtFormat,
    /// Value must be one of the listed options.
    In(Vec<String>),
    /// `url_title` must be unused among entries of the content type,
    /// ignoring the entry being edited.
    UniqueUrlTitle {
        content_type_id: Uuid,
        except: Option<Uuid>,
    },
}

impl Rule {
    /// Rules other than `Required` are skipped for empty values.
    fn is_implicit(&self) -> bool {
        matches!(self, Rule::Required)
    }
}

/// Ordered mapping of form key to rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<(String, Vec<Rule>)>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule to a field's list.
    pub fn add(&mut self, field: &str, rule: Rule) {
        match self.rules.iter_mut().find(|(name, _)| name == field) {
            Some((_, rules)) => rules.push(rule),
            None => self.rules.push((field.to_string(), vec![rule])),
        }
    }

    /// Replace a field's rules.
    pub fn set(&mut self, field: &str, rules: Vec<Rule>) {
        match self.rules.iter_mut().find(|(name, _)| name == field) {
            Some((_, existing)) => *existing = rules,
            None => self.rules.push((field.to_string(), rules)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&[Rule]> {
        self.rules
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, rules)| rules.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.rules
            .iter()
            .map(|(name, rules)| (name.as_str(), rules.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Storage lookup backing [`Rule::UniqueUrlTitle`].
#[async_trait]
pub trait UniqueLookup: Send + Sync {
    async fn url_title_taken(
        &self,
        content_type_id: Uuid,
        url_title: &str,
        except: Option<Uuid>,
    ) -> Result<bool>;
}

#[async_trait]
impl UniqueLookup for PgPool {
    async fn url_title_taken(
        &self,
        content_type_id: Uuid,
        url_title: &str,
        except: Option<Uuid>,
    ) -> Result<bool> {
        Entry::url_title_taken(self, content_type_id, url_title, except).await
    }
}

/// Evaluates a [`RuleSet`] against submitted data.
pub struct Validator<'a> {
    rules: &'a RuleSet,
    attribute_names: &'a HashMap<String, String>,
}

impl<'a> Validator<'a> {
    pub fn new(rules: &'a RuleSet, attribute_names: &'a HashMap<String, String>) -> Self {
        Self {
            rules,
            attribute_names,
        }
    }

    /// Display name of a form key.
    fn attribute(&self, field: &str) -> String {
        self.attribute_names
            .get(field)
            .cloned()
            .unwrap_or_else(|| field.replace('_', " "))
    }

    /// Validate `data`, returning every failure message in rule order.
    ///
    /// An empty list means the data passed. `Err` is reserved for lookup
    /// failures.
    pub async fn validate(
        &self,
        data: &Submission,
        lookup: &dyn UniqueLookup,
    ) -> Result<Vec<String>> {
        let mut messages = Vec::new();

        for (field, rules) in self.rules.iter() {
            let value = data.get(field);
            let empty = is_empty_value(value);

            for rule in rules {
                if empty && !rule.is_implicit() {
                    continue;
                }
                if let Some(message) = self.check(field, rule, value, lookup).await? {
                    messages.push(message);
                }
            }
        }

        Ok(messages)
    }

    async fn check(
        &self,
        field: &str,
        rule: &Rule,
        value: Option<&Value>,
        lookup: &dyn UniqueLookup,
    ) -> Result<Option<String>> {
        let attribute = self.attribute(field);
        let text = value.map(value_as_text).unwrap_or_default();

        let failed = match rule {
            Rule::Required => is_empty_value(value),
            Rule::AlphaDash => !ALPHA_DASH.is_match(&text),
            Rule::Max(max) => text.chars().count() > *max,
            Rule::Integer => text.trim().parse::<i64>().is_err(),
            Rule::Date => chrono::NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").is_err(),
            Rule::CreatedAtFormat => !created_at::matches_format(&text),
            Rule::In(options) => !options.iter().any(|option| option == &text),
            Rule::UniqueUrlTitle {
                content_type_id,
                except,
            } => {
                lookup
                    .url_title_taken(*content_type_id, &text, *except)
                    .await?
            }
        };

        if !failed {
            return Ok(None);
        }

        let message = match rule {
            Rule::Required => format!("The {attribute} field is required."),
            Rule::AlphaDash => format!(
                "The {attribute} may only contain letters, numbers, dashes and underscores."
            ),
            Rule::Max(max) => {
                format!("The {attribute} may not be greater than {max} characters.")
            }
            Rule::Integer => format!("The {attribute} must be an integer."),
            Rule::Date => format!("The {attribute} is not a valid date."),
            Rule::CreatedAtFormat => {
                format!("The {attribute} does not match the format {CREATED_AT_FORMAT_HINT}.")
            }
            Rule::In(_) => format!("The selected {attribute} is invalid."),
            Rule::UniqueUrlTitle { .. } => format!("The {attribute} has already been taken."),
        };

        Ok(Some(message))
    }
}

/// String form of a scalar value; arrays join with commas.
fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(values) => values
            .iter()
            .map(value_as_text)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}
