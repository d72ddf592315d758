//! Entry save, delete and form workflows.
//!
//! Saving runs Validating → Persisting → Revisioning → Redirecting. The
//! entry row, its field values and the revision bookkeeping are written in
//! one transaction, so a failure leaves neither a half-saved entry nor a
//! revision without its entry.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::EntryError;
use super::created_at;
use super::field_types::{AdminFieldView, FieldTypeRegistry};
use super::fields::ContentFields;
use super::revision_manager;
use super::submission::Submission;
use super::type_registry::ContentTypeRegistry;
use super::validation::{Rule, RuleSet, TITLE_MAX_LENGTH, URL_TITLE_MAX_LENGTH, Validator};
use crate::db;
use crate::models::entry::URL_TITLE_UNIQUE_INDEX;
use crate::models::{ContentType, Entry, EntryAttributes, EntryStatus, Revision, User};
use crate::permissions::{EntryAction, PermissionService};

/// Route of the entry listing.
pub const LISTING_PATH: &str = "/admin/content/entries";

/// Notice shown when the delete form is posted without a selection.
pub const EMPTY_DELETE_SELECTION: &str = "You must select at least one entry to delete.";

const URL_TITLE_TAKEN: &str = "The URL Title has already been taken.";

/// Where a save request is sent next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveRedirect {
    Listing,
    AddForm { content_type_id: Uuid },
    EditForm { content_type_id: Uuid, entry_id: Uuid },
}

impl SaveRedirect {
    /// The form a submission came from: the add form for new entries, the
    /// edit form otherwise.
    pub fn form(content_type_id: Uuid, entry_id: Option<Uuid>) -> Self {
        match entry_id {
            Some(entry_id) => SaveRedirect::EditForm {
                content_type_id,
                entry_id,
            },
            None => SaveRedirect::AddForm { content_type_id },
        }
    }

    pub fn path(&self) -> String {
        match self {
            SaveRedirect::Listing => LISTING_PATH.to_string(),
            SaveRedirect::AddForm { content_type_id } => {
                format!("/admin/content/type/{content_type_id}/entry/add")
            }
            SaveRedirect::EditForm {
                content_type_id,
                entry_id,
            } => format!("/admin/content/type/{content_type_id}/entry/{entry_id}/edit"),
        }
    }
}

/// Result of a save request that was allowed to run.
#[derive(Debug)]
pub enum SaveOutcome {
    /// Nothing was persisted; the form is shown again with these errors.
    Invalid {
        errors: Vec<String>,
        redirect: SaveRedirect,
    },
    Saved {
        entry: Entry,
        revision: Option<Revision>,
        redirect: SaveRedirect,
        message: String,
    },
}

impl SaveOutcome {
    pub fn redirect(&self) -> SaveRedirect {
        match self {
            SaveOutcome::Invalid { redirect, .. } | SaveOutcome::Saved { redirect, .. } => {
                *redirect
            }
        }
    }
}

/// Result of a best-effort batch delete.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted: usize,
    /// One message per entry that could not be deleted.
    pub errors: Vec<String>,
}

impl DeleteSummary {
    /// Success message, if anything was deleted.
    pub fn message(&self) -> Option<&'static str> {
        match (self.deleted, self.errors.is_empty()) {
            (0, _) => None,
            (_, true) => Some("The selected entry(s) were successfully deleted."),
            (_, false) => Some("Some of the selected entry(s) were successfully deleted."),
        }
    }
}

/// Everything the add/edit form displays.
#[derive(Debug, Serialize)]
pub struct EntryForm {
    pub content_type: ContentType,
    /// `None` on the add form.
    pub entry: Option<Entry>,
    /// `created_at` in the acting user's timezone and form format.
    pub created_at: String,
    pub fields: Vec<AdminFieldView>,
    pub entry_statuses: Vec<EntryStatus>,
    /// `(value, label)` pairs, starting with an empty option.
    pub author_options: Vec<(String, String)>,
    /// The revision the form was pre-filled from.
    pub revision: Option<Revision>,
    pub revisions: Vec<Revision>,
}

/// Display names of the base entry attributes.
const BASE_ATTRIBUTE_NAMES: [(&str, &str); 6] = [
    ("title", "Title"),
    ("url_title", "URL Title"),
    ("meta_title", "Meta Title"),
    ("created_at", "Created At"),
    ("entry_status_id", "Status"),
    ("author_id", "Author"),
];

/// Validation rules for saving an entry of `content_type`.
///
/// `except` is the id of the entry being edited, excluded from the
/// `url_title` uniqueness check.
pub fn entry_rules(
    content_type: &ContentType,
    fields: &ContentFields,
    except: Option<Uuid>,
    statuses: &[EntryStatus],
    author_ids: &[Uuid],
) -> RuleSet {
    let mut rules = fields.validation_rules();

    rules.set("title", vec![Rule::Required, Rule::Max(TITLE_MAX_LENGTH)]);

    if content_type.dynamic_routing_flag {
        rules.set(
            "url_title",
            vec![
                Rule::Required,
                Rule::AlphaDash,
                Rule::Max(URL_TITLE_MAX_LENGTH),
                Rule::UniqueUrlTitle {
                    content_type_id: content_type.id,
                    except,
                },
            ],
        );
    }

    rules.set("meta_title", vec![Rule::Max(TITLE_MAX_LENGTH)]);
    rules.set("created_at", vec![Rule::Required, Rule::CreatedAtFormat]);
    rules.set(
        "entry_status_id",
        vec![Rule::In(statuses.iter().map(|s| s.id.to_string()).collect())],
    );
    rules.set(
        "author_id",
        vec![Rule::In(author_ids.iter().map(Uuid::to_string).collect())],
    );

    rules
}

/// Scalar entry attributes from submitted data (or a revision snapshot).
///
/// `url_title` is only kept for content types with dynamic routing.
/// `created_at` is left unset; callers convert it separately.
pub fn entry_attributes(data: &Submission, dynamic_routing: bool) -> EntryAttributes {
    let optional = |key: &str| data.non_blank(key).map(str::to_string);

    EntryAttributes {
        title: data.text("title").map(str::trim).unwrap_or_default().to_string(),
        url_title: if dynamic_routing {
            optional("url_title")
        } else {
            None
        },
        entry_status_id: data
            .non_blank("entry_status_id")
            .and_then(|s| s.parse().ok()),
        author_id: data
            .non_blank("author_id")
            .and_then(|s| Uuid::parse_str(s).ok()),
        meta_title: optional("meta_title"),
        meta_keywords: optional("meta_keywords"),
        meta_description: optional("meta_description"),
        created_at: None,
    }
}

/// Whether a create-form authorization result allows a new entry; denials
/// are `false`, storage failures propagate.
fn grants_new_entry(decision: Result<(), EntryError>) -> Result<bool, EntryError> {
    match decision {
        Ok(()) => Ok(true),
        Err(EntryError::AccessDenied(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Author dropdown options: an empty choice followed by every author.
pub fn author_options(authors: &[User]) -> Vec<(String, String)> {
    std::iter::once((String::new(), String::new()))
        .chain(
            authors
                .iter()
                .map(|author| (author.id.to_string(), author.full_name())),
        )
        .collect()
}

/// Service running the entry workflows.
#[derive(Clone)]
pub struct EntryService {
    inner: Arc<EntryServiceInner>,
}

struct EntryServiceInner {
    pool: PgPool,
    content_types: ContentTypeRegistry,
    field_types: Arc<FieldTypeRegistry>,
    permissions: PermissionService,
    app_timezone: Tz,
}

impl EntryService {
    /// Create a new entry service.
    pub fn new(
        pool: PgPool,
        content_types: ContentTypeRegistry,
        field_types: Arc<FieldTypeRegistry>,
        permissions: PermissionService,
        app_timezone: Tz,
    ) -> Self {
        Self {
            inner: Arc::new(EntryServiceInner {
                pool,
                content_types,
                field_types,
                permissions,
                app_timezone,
            }),
        }
    }

    pub fn app_timezone(&self) -> Tz {
        self.inner.app_timezone
    }

    /// Load a content type with its fields.
    pub async fn content_type(&self, id: Uuid) -> Result<ContentType, EntryError> {
        self.inner
            .content_types
            .get(id)
            .await?
            .ok_or(EntryError::NotFound)
    }

    /// Load an entry, which must belong to `content_type`.
    pub async fn entry_of_type(
        &self,
        content_type: &ContentType,
        entry_id: Uuid,
    ) -> Result<Entry, EntryError> {
        match Entry::find_by_id(&self.inner.pool, entry_id).await? {
            Some(entry) if entry.content_type_id == content_type.id => Ok(entry),
            _ => Err(EntryError::NotFound),
        }
    }

    /// Load a revision, which must be a snapshot of `entry`.
    pub async fn revision_of_entry(
        &self,
        entry: &Entry,
        revision_id: Uuid,
    ) -> Result<Revision, EntryError> {
        match Revision::find_by_id(&self.inner.pool, revision_id).await? {
            Some(revision) if revision.belongs_to_entry(entry.id) => Ok(revision),
            _ => Err(EntryError::NotFound),
        }
    }

    /// Check that `user` may open or submit the add (`entry` is `None`) or
    /// edit form.
    pub async fn authorize_form(
        &self,
        content_type: &ContentType,
        entry: Option<&Entry>,
        user: &User,
    ) -> Result<(), EntryError> {
        match entry {
            None => {
                let count = content_type.entry_count(&self.inner.pool).await?;
                if !content_type.allows_another_entry(count) {
                    return Err(EntryError::AccessDenied(format!(
                        "{} does not allow any more entries.",
                        content_type.title
                    )));
                }
                self.require(user, EntryAction::Create, content_type).await
            }
            Some(_) => self.require(user, EntryAction::Edit, content_type).await,
        }
    }

    async fn require(
        &self,
        user: &User,
        action: EntryAction,
        content_type: &ContentType,
    ) -> Result<(), EntryError> {
        if self.inner.permissions.can(user, action, content_type).await? {
            Ok(())
        } else {
            Err(EntryError::AccessDenied(format!(
                "You do not have permission to {} {} entries.",
                action.as_str(),
                content_type.title
            )))
        }
    }

    /// Validate and persist a submission, then record a revision.
    ///
    /// Authorization failures and storage errors are `Err`; validation
    /// failures are [`SaveOutcome::Invalid`].
    pub async fn save(
        &self,
        content_type: &ContentType,
        entry: Option<Entry>,
        submission: Submission,
        user: &User,
    ) -> Result<SaveOutcome, EntryError> {
        self.authorize_form(content_type, entry.as_ref(), user)
            .await?;

        let existing_id = entry.as_ref().map(|e| e.id);
        let form = SaveRedirect::form(content_type.id, existing_id);

        // Validating
        let mut fields = ContentFields::for_content_type(content_type, &self.inner.field_types);
        let statuses = EntryStatus::list(&self.inner.pool).await?;
        let mut author_ids: Vec<Uuid> = User::list_authors(&self.inner.pool)
            .await?
            .iter()
            .map(|author| author.id)
            .collect();
        // The current author stays selectable even if no longer active.
        author_ids.extend(entry.as_ref().and_then(|e| e.author_id));

        let rules = entry_rules(content_type, &fields, existing_id, &statuses, &author_ids);
        let mut names = fields.attribute_names();
        for (key, name) in BASE_ATTRIBUTE_NAMES {
            names.insert(key.to_string(), name.to_string());
        }

        let errors = Validator::new(&rules, &names)
            .validate(&submission, &self.inner.pool)
            .await?;
        if !errors.is_empty() {
            return Ok(SaveOutcome::Invalid {
                errors,
                redirect: form,
            });
        }

        let user_timezone = user.timezone_or(self.inner.app_timezone);
        let created_at = match created_at::convert(
            submission.text("created_at").unwrap_or_default(),
            user_timezone,
            self.inner.app_timezone,
        ) {
            Ok(created_at) => created_at,
            Err(e) => {
                return Ok(SaveOutcome::Invalid {
                    errors: vec![format!("The Created At is not a valid time: {e}.")],
                    redirect: form,
                });
            }
        };

        let mut data = submission;
        data.set(
            "created_at",
            Value::String(created_at::format_for_snapshot(&created_at)),
        );

        let mut attributes = entry_attributes(&data, content_type.dynamic_routing_flag);
        attributes.created_at = Some(created_at.with_timezone(&Utc));

        let mut entry = entry.unwrap_or_else(|| Entry::new(content_type.id));
        entry.apply(attributes);
        entry.content_type_id = content_type.id;

        // Persisting + Revisioning
        let mut tx = self
            .inner
            .pool
            .begin()
            .await
            .context("failed to start transaction")?;

        let persisted = async {
            let inserted = entry.save(&mut *tx).await?;

            fields.set_entry(entry.id);
            fields.fill(&data);
            fields.save(&mut *tx).await?;

            let revision =
                revision_manager::record(&mut *tx, content_type, &entry, user, data.to_payload())
                    .await?;

            Ok::<_, anyhow::Error>((inserted, revision))
        }
        .await;

        let (inserted, revision) = match persisted {
            Ok(saved) => saved,
            Err(e) if db::is_unique_violation(&e, URL_TITLE_UNIQUE_INDEX) => {
                warn!(
                    content_type_id = %content_type.id,
                    url_title = ?entry.url_title,
                    "url_title claimed concurrently"
                );
                return Ok(SaveOutcome::Invalid {
                    errors: vec![URL_TITLE_TAKEN.to_string()],
                    redirect: form,
                });
            }
            Err(e) => return Err(EntryError::Persistence(e)),
        };

        tx.commit().await.context("failed to commit entry save")?;

        info!(
            entry_id = %entry.id,
            content_type_id = %content_type.id,
            created = inserted,
            revision_id = ?revision.as_ref().map(|r| r.id),
            "entry saved"
        );

        let redirect = if data.flag("save_exit") {
            SaveRedirect::Listing
        } else {
            SaveRedirect::form(content_type.id, Some(entry.id))
        };
        let message = format!("{} was successfully updated.", entry.title);

        Ok(SaveOutcome::Saved {
            entry,
            revision,
            redirect,
            message,
        })
    }

    /// Delete the selected entries, collecting a message for every entry
    /// that could not be deleted. Unknown ids are skipped.
    pub async fn delete_many(&self, ids: &[Uuid], user: &User) -> Result<DeleteSummary, EntryError> {
        let mut summary = DeleteSummary::default();

        for entry in Entry::find_many(&self.inner.pool, ids).await? {
            let Some(content_type) = self.inner.content_types.get(entry.content_type_id).await?
            else {
                summary
                    .errors
                    .push(format!("{} has no content type.", entry.title));
                continue;
            };

            if !self
                .inner
                .permissions
                .can(user, EntryAction::Delete, &content_type)
                .await?
            {
                summary.errors.push(format!(
                    "You do not have permission to delete {}.",
                    entry.title
                ));
                continue;
            }

            if Entry::delete(&self.inner.pool, entry.id).await? {
                info!(entry_id = %entry.id, content_type_id = %content_type.id, "entry deleted");
                summary.deleted += 1;
            }
        }

        Ok(summary)
    }

    /// Entries of the given ids, for delete confirmation.
    pub async fn entries(&self, ids: &[Uuid]) -> Result<Vec<Entry>, EntryError> {
        Ok(Entry::find_many(&self.inner.pool, ids).await?)
    }

    /// Content types `user` may view entries of.
    pub async fn viewable_content_types(&self, user: &User) -> Result<Vec<ContentType>, EntryError> {
        let mut viewable = Vec::new();
        for content_type in self.inner.content_types.list().await? {
            if self
                .inner
                .permissions
                .can(user, EntryAction::View, &content_type)
                .await?
            {
                viewable.push(content_type);
            }
        }
        Ok(viewable)
    }

    /// Content types `user` may create another entry of.
    pub async fn available_for_new_entry(
        &self,
        user: &User,
    ) -> Result<Vec<ContentType>, EntryError> {
        let mut available = Vec::new();
        for content_type in self.inner.content_types.list().await? {
            let decision = self.authorize_form(&content_type, None, user).await;
            if grants_new_entry(decision)? {
                available.push(content_type);
            }
        }
        Ok(available)
    }

    /// Build the add/edit form, optionally pre-filled from a revision.
    pub async fn form(
        &self,
        content_type: ContentType,
        mut entry: Option<Entry>,
        revision: Option<Revision>,
        user: &User,
    ) -> Result<EntryForm, EntryError> {
        self.authorize_form(&content_type, entry.as_ref(), user)
            .await?;

        let mut fields = ContentFields::load(
            &self.inner.pool,
            &content_type,
            &self.inner.field_types,
            entry.as_ref(),
        )
        .await?;

        if let (Some(entry), Some(revision)) = (entry.as_mut(), revision.as_ref()) {
            let snapshot = Submission::from_value(&revision.data);
            let mut attributes = entry_attributes(&snapshot, content_type.dynamic_routing_flag);
            attributes.created_at = snapshot
                .text("created_at")
                .and_then(|value| created_at::parse_snapshot(value, self.inner.app_timezone));
            entry.apply(attributes);
            fields.fill(&snapshot);
        }

        let revisions = match entry.as_ref() {
            Some(entry) => Revision::list_for_entry(&self.inner.pool, entry.id).await?,
            None => Vec::new(),
        };

        let created_at = created_at::format_for_form(
            entry.as_ref().map_or_else(Utc::now, |e| e.created_at),
            user.timezone_or(self.inner.app_timezone),
        );

        let authors = User::list_authors(&self.inner.pool).await?;

        Ok(EntryForm {
            entry_statuses: EntryStatus::list(&self.inner.pool).await?,
            author_options: author_options(&authors),
            fields: fields.admin_views(),
            content_type,
            entry,
            created_at,
            revision,
            revisions,
        })
    }
}
