//! Admin routes for entry management.
//!
//! GET handlers answer with JSON view models; POST handlers redirect and
//! carry their outcome to the next request as flash data.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::content::listing::EntryPage;
use crate::content::{
    EMPTY_DELETE_SELECTION, EntryForm, EntryListingQuery, LISTING_PATH, ListingState,
    ListingStateStore, SaveOutcome, SessionListingStore, Submission, Visibility,
};
use crate::error::AppResult;
use crate::form::generate_csrf_token;
use crate::models::{ContentType, Entry, EntryStatus, Role, User};
use crate::session::Flash;
use crate::state::AppState;

use super::helpers::{redirect_with, require_csrf, require_login, selected_ids};

type FormPairs = Form<Vec<(String, String)>>;

#[derive(Debug, Deserialize)]
struct ListingParams {
    page: Option<u64>,
}

#[derive(Serialize)]
struct ListingView {
    entries: EntryPage,
    listing: ListingState,
    content_types: Vec<ContentType>,
    viewable_content_types: Vec<ContentType>,
    entry_statuses: Vec<EntryStatus>,
    flash: Flash,
    csrf_token: String,
}

#[derive(Serialize)]
struct DeleteVerifyView {
    entries: Vec<Entry>,
    csrf_token: String,
}

#[derive(Serialize)]
struct FormView {
    #[serde(flatten)]
    form: EntryForm,
    flash: Flash,
    csrf_token: String,
}

async fn visibility_for(state: &AppState, user: &User) -> AppResult<Visibility> {
    if user.is_admin {
        return Ok(Visibility::All);
    }
    Ok(Visibility::Roles(
        Role::ids_for_user(state.db(), user.id).await?,
    ))
}

/// List entries.
///
/// GET /admin/content/entries
async fn list_entries(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<ListingParams>,
) -> AppResult<Response> {
    let user = require_login(&state, &session).await?;

    let listing = SessionListingStore::new(session.clone()).load().await?;
    let visibility = visibility_for(&state, &user).await?;
    let page = params.page.unwrap_or(1).max(1);

    let entries = EntryListingQuery::new(&listing, visibility)
        .fetch(state.db(), page, state.entries_per_page())
        .await?;

    let view = ListingView {
        entries,
        content_types: state.entries().available_for_new_entry(&user).await?,
        viewable_content_types: state.entries().viewable_content_types(&user).await?,
        entry_statuses: EntryStatus::list(state.db()).await?,
        listing,
        flash: Flash::take(&session).await?,
        csrf_token: generate_csrf_token(&session).await?,
    };

    Ok(Json(view).into_response())
}

/// Store the listing filter and order.
///
/// POST /admin/content/entries
async fn filter_entries(
    State(state): State<AppState>,
    session: Session,
    Form(pairs): FormPairs,
) -> AppResult<Response> {
    require_login(&state, &session).await?;

    let submission = Submission::from_pairs(pairs);
    require_csrf(&session, &submission).await?;

    let store = SessionListingStore::new(session.clone());
    let mut listing = store.load().await?;
    listing.apply_request(&submission);
    store.store(&listing).await?;

    Ok(Redirect::to(LISTING_PATH).into_response())
}

/// Confirm deletion of the selected entries.
///
/// POST /admin/content/entries/delete-verify
async fn delete_verify(
    State(state): State<AppState>,
    session: Session,
    Form(pairs): FormPairs,
) -> AppResult<Response> {
    require_login(&state, &session).await?;

    let submission = Submission::from_pairs(pairs);
    require_csrf(&session, &submission).await?;

    let ids = selected_ids(&submission);
    if ids.is_empty() {
        return Ok(Redirect::to(LISTING_PATH).into_response());
    }

    let view = DeleteVerifyView {
        entries: state.entries().entries(&ids).await?,
        csrf_token: generate_csrf_token(&session).await?,
    };

    Ok(Json(view).into_response())
}

/// Delete the selected entries.
///
/// POST /admin/content/entries/delete
async fn delete_entries(
    State(state): State<AppState>,
    session: Session,
    Form(pairs): FormPairs,
) -> AppResult<Response> {
    let user = require_login(&state, &session).await?;

    let submission = Submission::from_pairs(pairs);
    require_csrf(&session, &submission).await?;

    let ids = selected_ids(&submission);
    if ids.is_empty() {
        return redirect_with(&session, LISTING_PATH, Flash::notice(EMPTY_DELETE_SELECTION))
            .await;
    }

    let summary = state.entries().delete_many(&ids, &user).await?;

    let flash = Flash {
        message: summary.message().map(str::to_string),
        errors: summary.errors,
        ..Default::default()
    };

    redirect_with(&session, LISTING_PATH, flash).await
}

async fn render_form(
    state: &AppState,
    session: &Session,
    user: &User,
    content_type_id: Uuid,
    entry_id: Option<Uuid>,
    revision_id: Option<Uuid>,
) -> AppResult<Response> {
    let entries = state.entries();
    let content_type = entries.content_type(content_type_id).await?;

    let entry = match entry_id {
        Some(id) => Some(entries.entry_of_type(&content_type, id).await?),
        None => None,
    };
    let revision = match (entry.as_ref(), revision_id) {
        (Some(entry), Some(id)) => Some(entries.revision_of_entry(entry, id).await?),
        _ => None,
    };

    let view = FormView {
        form: entries.form(content_type, entry, revision, user).await?,
        flash: Flash::take(session).await?,
        csrf_token: generate_csrf_token(session).await?,
    };

    Ok(Json(view).into_response())
}

/// Show the add entry form.
///
/// GET /admin/content/type/{content_type_id}/entry/add
async fn add_form(
    State(state): State<AppState>,
    session: Session,
    Path(content_type_id): Path<Uuid>,
) -> AppResult<Response> {
    let user = require_login(&state, &session).await?;
    render_form(&state, &session, &user, content_type_id, None, None).await
}

/// Show the edit entry form.
///
/// GET /admin/content/type/{content_type_id}/entry/{entry_id}/edit
async fn edit_form(
    State(state): State<AppState>,
    session: Session,
    Path((content_type_id, entry_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let user = require_login(&state, &session).await?;
    render_form(&state, &session, &user, content_type_id, Some(entry_id), None).await
}

/// Show the edit form pre-filled from a revision.
///
/// GET /admin/content/type/{content_type_id}/entry/{entry_id}/edit/revision/{revision_id}
async fn revision_form(
    State(state): State<AppState>,
    session: Session,
    Path((content_type_id, entry_id, revision_id)): Path<(Uuid, Uuid, Uuid)>,
) -> AppResult<Response> {
    let user = require_login(&state, &session).await?;
    render_form(
        &state,
        &session,
        &user,
        content_type_id,
        Some(entry_id),
        Some(revision_id),
    )
    .await
}

async fn save(
    state: &AppState,
    session: &Session,
    user: &User,
    content_type_id: Uuid,
    entry_id: Option<Uuid>,
    pairs: Vec<(String, String)>,
) -> AppResult<Response> {
    let submission = Submission::from_pairs(pairs);
    require_csrf(session, &submission).await?;

    let entries = state.entries();
    let content_type = entries.content_type(content_type_id).await?;
    let entry = match entry_id {
        Some(id) => Some(entries.entry_of_type(&content_type, id).await?),
        None => None,
    };

    let input = submission.as_map().clone();
    let outcome = entries.save(&content_type, entry, submission, user).await?;
    let path = outcome.redirect().path();

    let flash = match outcome {
        SaveOutcome::Invalid { errors, .. } => Flash::default()
            .with_errors(errors)
            .with_old_input(&input),
        SaveOutcome::Saved { message, .. } => Flash::message(message),
    };

    redirect_with(session, &path, flash).await
}

/// Create an entry.
///
/// POST /admin/content/type/{content_type_id}/entry/add
async fn add_submit(
    State(state): State<AppState>,
    session: Session,
    Path(content_type_id): Path<Uuid>,
    Form(pairs): FormPairs,
) -> AppResult<Response> {
    let user = require_login(&state, &session).await?;
    save(&state, &session, &user, content_type_id, None, pairs).await
}

/// Update an entry.
///
/// POST /admin/content/type/{content_type_id}/entry/{entry_id}/edit
async fn edit_submit(
    State(state): State<AppState>,
    session: Session,
    Path((content_type_id, entry_id)): Path<(Uuid, Uuid)>,
    Form(pairs): FormPairs,
) -> AppResult<Response> {
    let user = require_login(&state, &session).await?;
    save(&state, &session, &user, content_type_id, Some(entry_id), pairs).await
}

/// Update an entry from the revision form.
///
/// POST /admin/content/type/{content_type_id}/entry/{entry_id}/edit/revision/{revision_id}
async fn revision_submit(
    State(state): State<AppState>,
    session: Session,
    Path((content_type_id, entry_id, revision_id)): Path<(Uuid, Uuid, Uuid)>,
    Form(pairs): FormPairs,
) -> AppResult<Response> {
    let user = require_login(&state, &session).await?;

    let content_type = state.entries().content_type(content_type_id).await?;
    let entry = state
        .entries()
        .entry_of_type(&content_type, entry_id)
        .await?;
    state.entries().revision_of_entry(&entry, revision_id).await?;

    save(&state, &session, &user, content_type_id, Some(entry_id), pairs).await
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(LISTING_PATH, get(list_entries).post(filter_entries))
        .route("/admin/content/entries/delete-verify", post(delete_verify))
        .route("/admin/content/entries/delete", post(delete_entries))
        .route(
            "/admin/content/type/{content_type_id}/entry/add",
            get(add_form).post(add_submit),
        )
        .route(
            "/admin/content/type/{content_type_id}/entry/{entry_id}/edit",
            get(edit_form).post(edit_submit),
        )
        .route(
            "/admin/content/type/{content_type_id}/entry/{entry_id}/edit/revision/{revision_id}",
            get(revision_form).post(revision_submit),
        )
}
