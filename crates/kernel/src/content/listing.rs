//! Admin entry listing.
//!
//! The filter and sort order of the listing live in an explicit
//! [`ListingState`] loaded from and saved to a [`ListingStateStore`] (the
//! session in production). [`EntryListingQuery`] turns a state into SQL
//! with SeaQuery.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sea_query::{
    Alias, Asterisk, Cond, Expr, Func, Order, PostgresQueryBuilder, Query,
    SelectStatement,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_sessions::Session;
use uuid::Uuid;

use super::submission::Submission;
use crate::models::Entry;

/// Session key of the listing state.
const LISTING_STATE_KEY: &str = "entry_listing_state";

/// Columns the listing may be ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderColumn {
    Title,
    ContentTypeTitle,
    EntryStatusName,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl OrderColumn {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "title" => Some(OrderColumn::Title),
            "content_type_title" => Some(OrderColumn::ContentTypeTitle),
            "entry_status_name" => Some(OrderColumn::EntryStatusName),
            "created_at" => Some(OrderColumn::CreatedAt),
            "updated_at" => Some(OrderColumn::UpdatedAt),
            _ => None,
        }
    }

    fn apply(self, query: &mut SelectStatement, order: Order) {
        match self {
            OrderColumn::Title => query.order_by((entries(), Alias::new("title")), order),
            OrderColumn::ContentTypeTitle => {
                query.order_by(Alias::new("content_type_title"), order)
            }
            OrderColumn::EntryStatusName => query.order_by(Alias::new("entry_status_name"), order),
            OrderColumn::CreatedAt => query.order_by((entries(), Alias::new("created_at")), order),
            OrderColumn::UpdatedAt => query.order_by((entries(), Alias::new("updated_at")), order),
        };
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    fn order(self) -> Order {
        match self {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: OrderColumn,
    pub sort: SortDirection,
}

/// Listing filters; `None` means unfiltered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFilter {
    pub search: Option<String>,
    pub content_type_id: Option<Uuid>,
    pub entry_status_id: Option<i16>,
}

/// Filter and order of the entry listing for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingState {
    pub filter: EntryFilter,
    pub order_by: OrderBy,
}

impl ListingState {
    /// Apply a posted filter form.
    ///
    /// `clear_filter` resets the filter and keeps the order. Unknown order
    /// columns and directions are ignored.
    pub fn apply_request(&mut self, data: &Submission) {
        if data.flag("clear_filter") {
            self.filter = EntryFilter::default();
        } else {
            self.filter = EntryFilter {
                search: data.non_blank("search").map(str::to_string),
                content_type_id: data
                    .non_blank("content_type_id")
                    .and_then(|s| Uuid::parse_str(s).ok()),
                entry_status_id: data
                    .non_blank("entry_status_id")
                    .and_then(|s| s.parse().ok()),
            };
        }

        if let Some(column) = data.non_blank("order_by").and_then(OrderColumn::parse) {
            self.order_by.column = column;
        }
        if let Some(sort) = data.non_blank("sort").and_then(SortDirection::parse) {
            self.order_by.sort = sort;
        }
    }
}

/// Per-user persistence of the listing state.
#[async_trait]
pub trait ListingStateStore: Send + Sync {
    /// The stored state, or the default when none was stored.
    async fn load(&self) -> Result<ListingState>;

    async fn store(&self, state: &ListingState) -> Result<()>;
}

/// [`ListingStateStore`] kept in the user's session.
pub struct SessionListingStore {
    session: Session,
}

impl SessionListingStore {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ListingStateStore for SessionListingStore {
    async fn load(&self) -> Result<ListingState> {
        let state: Option<ListingState> = self
            .session
            .get(LISTING_STATE_KEY)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read listing state: {}", e))?;
        Ok(state.unwrap_or_default())
    }

    async fn store(&self, state: &ListingState) -> Result<()> {
        self.session
            .insert(LISTING_STATE_KEY, state)
            .await
            .map_err(|e| anyhow::anyhow!("failed to store listing state: {}", e))?;
        Ok(())
    }
}

/// Which entries a user may see in the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// Admins see every entry.
    All,
    /// Entries of content types without a view permission, or whose view
    /// permission is granted to one of these roles.
    Roles(Vec<Uuid>),
}

/// One listing row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EntryListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub entry: Entry,
    pub content_type_title: String,
    pub entry_status_name: String,
}

/// A page of the listing.
#[derive(Debug, Clone, Serialize)]
pub struct EntryPage {
    pub items: Vec<EntryListItem>,
    pub total: i64,
    pub page: u64,
    pub per_page: u64,
    pub last_page: u64,
}

fn entries() -> Alias {
    Alias::new("entries")
}

fn content_types() -> Alias {
    Alias::new("content_types")
}

fn entry_statuses() -> Alias {
    Alias::new("entry_statuses")
}

fn role_permissions() -> Alias {
    Alias::new("role_permissions")
}

/// Query builder for the entry listing.
pub struct EntryListingQuery<'a> {
    state: &'a ListingState,
    visibility: Visibility,
}

impl<'a> EntryListingQuery<'a> {
    pub fn new(state: &'a ListingState, visibility: Visibility) -> Self {
        Self { state, visibility }
    }

    /// Build the page query. Pages start at 1.
    pub fn build(&self, page: u64, per_page: u64) -> String {
        let mut query = Query::select();

        query
            .distinct()
            .column((entries(), Asterisk))
            .expr_as(
                Expr::col((content_types(), Alias::new("title"))),
                Alias::new("content_type_title"),
            )
            .expr_as(
                Expr::col((entry_statuses(), Alias::new("name"))),
                Alias::new("entry_status_name"),
            )
            .from(entries());

        self.add_joins(&mut query);
        self.add_conditions(&mut query);

        let OrderBy { column, sort } = self.state.order_by;
        column.apply(&mut query, sort.order());
        // Stable pagination across equal sort keys.
        query.order_by((entries(), Alias::new("id")), Order::Asc);

        query.limit(per_page);
        query.offset(page.saturating_sub(1) * per_page);

        query.to_string(PostgresQueryBuilder)
    }

    /// Build a COUNT query for total results.
    pub fn build_count(&self) -> String {
        let mut query = Query::select();

        query
            .expr(Expr::cust(r#"COUNT(DISTINCT "entries"."id")"#))
            .from(entries());

        self.add_joins(&mut query);
        self.add_conditions(&mut query);

        query.to_string(PostgresQueryBuilder)
    }

    fn add_joins(&self, query: &mut SelectStatement) {
        query
            .inner_join(
                content_types(),
                Expr::col((entries(), Alias::new("content_type_id")))
                    .equals((content_types(), Alias::new("id"))),
            )
            .inner_join(
                entry_statuses(),
                Expr::col((entries(), Alias::new("entry_status_id")))
                    .equals((entry_statuses(), Alias::new("id"))),
            );

        if matches!(self.visibility, Visibility::Roles(_)) {
            query.left_join(
                role_permissions(),
                Expr::col((content_types(), Alias::new("admin_entry_view_permission_id")))
                    .equals((role_permissions(), Alias::new("permission_id"))),
            );
        }
    }

    fn add_conditions(&self, query: &mut SelectStatement) {
        if let Visibility::Roles(role_ids) = &self.visibility {
            let mut visible = Cond::any().add(
                Expr::col((content_types(), Alias::new("admin_entry_view_permission_id")))
                    .is_null(),
            );
            if !role_ids.is_empty() {
                visible = visible.add(
                    Expr::col((role_permissions(), Alias::new("role_id")))
                        .is_in(role_ids.iter().copied()),
                );
            }
            query.cond_where(visible);
        }

        let filter = &self.state.filter;

        if let Some(search) = filter.search.as_deref() {
            let pattern = format!("%{}%", escape_like_wildcards(&search.to_lowercase()));
            query.and_where(
                Expr::expr(Func::lower(Expr::col((entries(), Alias::new("title")))))
                    .like(pattern),
            );
        }

        if let Some(content_type_id) = filter.content_type_id {
            query.and_where(
                Expr::col((entries(), Alias::new("content_type_id"))).eq(content_type_id),
            );
        }

        if let Some(entry_status_id) = filter.entry_status_id {
            query.and_where(
                Expr::col((entries(), Alias::new("entry_status_id"))).eq(entry_status_id),
            );
        }
    }

    /// Run the query and fetch one page.
    pub async fn fetch(&self, pool: &PgPool, page: u64, per_page: u64) -> Result<EntryPage> {
        let items = sqlx::query_as::<_, EntryListItem>(&self.build(page, per_page))
            .fetch_all(pool)
            .await
            .context("failed to list entries")?;

        let total: i64 = sqlx::query_scalar(&self.build_count())
            .fetch_one(pool)
            .await
            .context("failed to count entries")?;

        Ok(EntryPage {
            items,
            total,
            page,
            per_page,
            last_page: last_page(total, per_page),
        })
    }
}

/// Number of the last page (at least 1).
pub fn last_page(total: i64, per_page: u64) -> u64 {
    let total = u64::try_from(total).unwrap_or(0);
    if per_page == 0 {
        return 1;
    }
    total.div_ceil(per_page).max(1)
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
