//! Entry management.
//!
//! This module provides:
//! - FieldTypeRegistry / ContentFields: dynamic field handlers per content type
//! - Validator: rule evaluation with human-readable messages
//! - EntryService: the save, delete and form workflows
//! - revision_manager: bounded revision retention
//! - EntryListingQuery: the filtered, paginated admin listing

pub mod created_at;
mod entry_service;
pub mod field_types;
mod fields;
pub mod listing;
pub mod revision_manager;
mod submission;
mod type_registry;
pub mod validation;

use thiserror::Error;

pub use entry_service::{
    DeleteSummary, EMPTY_DELETE_SELECTION, EntryForm, EntryService, LISTING_PATH, SaveOutcome,
    SaveRedirect, author_options, entry_attributes, entry_rules,
};
pub use field_types::{AdminFieldView, FieldHandler, FieldTypeRegistry};
pub use fields::ContentFields;
pub use listing::{EntryListingQuery, ListingState, ListingStateStore, SessionListingStore, Visibility};
pub use submission::{Submission, is_empty_value};
pub use type_registry::ContentTypeRegistry;
pub use validation::{Rule, RuleSet, UniqueLookup, Validator};

/// Failures of the entry workflows other than invalid input.
#[derive(Debug, Error)]
pub enum EntryError {
    /// The acting user may not perform the operation.
    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("not found")]
    NotFound,

    #[error("persistence failure")]
    Persistence(#[from] anyhow::Error),
}
