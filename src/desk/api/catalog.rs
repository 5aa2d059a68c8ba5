//! `/ticket-categories` and `/ticket-tags`.

use axum::{
    Router,
    extract::State,
    routing::{get, put},
};
use helpdesk_common::models::{TicketCategory, TicketTag};
use serde::Deserialize;

use super::extract::{ApiJson, ApiPath, ApiQuery, double_option};
use super::{ArchiveQuery, Created, ListParams, Reply, SharedState, created, found, listed, ok};
use crate::desk::auth::CurrentAdmin;
use crate::desk::db::{ArchiveFilter, CategoryChanges, TagChanges};
use crate::desk::validate::Checks;

const SORTS: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "name"),
    ("created_at", "created_at"),
];

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/ticket-categories", get(list_categories).post(create_category))
        .route("/ticket-categories/{id}", get(get_category).put(update_category))
        .route("/ticket-categories/{id}/archive", put(archive_category))
        .route("/ticket-categories/{id}/restore", put(restore_category))
        .route("/ticket-tags", get(list_tags).post(create_tag))
        .route("/ticket-tags/{id}", get(get_tag).put(update_tag))
        .route("/ticket-tags/{id}/archive", put(archive_tag))
        .route("/ticket-tags/{id}/restore", put(restore_tag))
}

#[derive(Deserialize)]
pub struct CreateCategoryRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateTagRequest {
    #[serde(default)]
    pub name: String,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTagRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<String>>,
}

// ── Categories ────────────────────────────────────────────────────────

async fn list_categories(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiQuery(params): ApiQuery<ListParams>,
    ApiQuery(query): ApiQuery<ArchiveQuery>,
) -> Reply<Vec<TicketCategory>> {
    let (sort, page) = params.resolve(&state.pagination, SORTS)?;
    let filter = ArchiveFilter::from(query);
    let categories = state
        .db
        .call(move |db| db.list_categories(&filter, sort, page))
        .await?;
    Ok(listed(categories, "Ticket categories retrieved successfully"))
}

async fn create_category(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiJson(req): ApiJson<CreateCategoryRequest>,
) -> Created<TicketCategory> {
    let mut checks = Checks::new();
    checks.required("name", &req.name);
    checks.finish()?;

    let name = req.name.trim().to_string();
    let description = req.description.unwrap_or_default();
    let category = state
        .db
        .call(move |db| db.create_category(&name, &description))
        .await?;
    Ok(created(category, "Ticket category created successfully"))
}

async fn get_category(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<TicketCategory> {
    let category = state.db.call(move |db| db.get_category(id)).await?;
    Ok(ok(
        found(category, "Ticket category", id)?,
        "Ticket category retrieved successfully",
    ))
}

async fn update_category(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateCategoryRequest>,
) -> Reply<TicketCategory> {
    let mut checks = Checks::new();
    checks.required_opt("name", req.name.as_deref());
    checks.finish()?;

    let changes = CategoryChanges {
        name: req.name.map(|n| n.trim().to_string()),
        description: req.description,
    };
    let category = state
        .db
        .call(move |db| db.update_category(id, &changes))
        .await?;
    Ok(ok(category, "Ticket category updated successfully"))
}

async fn archive_category(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<TicketCategory> {
    let category = state
        .db
        .call(move |db| db.set_category_archived(id, true))
        .await?;
    Ok(ok(category, "Ticket category archived successfully"))
}

async fn restore_category(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<TicketCategory> {
    let category = state
        .db
        .call(move |db| db.set_category_archived(id, false))
        .await?;
    Ok(ok(category, "Ticket category restored successfully"))
}

// ── Tags ──────────────────────────────────────────────────────────────

async fn list_tags(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiQuery(params): ApiQuery<ListParams>,
    ApiQuery(query): ApiQuery<ArchiveQuery>,
) -> Reply<Vec<TicketTag>> {
    let (sort, page) = params.resolve(&state.pagination, SORTS)?;
    let filter = ArchiveFilter::from(query);
    let tags = state
        .db
        .call(move |db| db.list_tags(&filter, sort, page))
        .await?;
    Ok(listed(tags, "Ticket tags retrieved successfully"))
}

async fn create_tag(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiJson(req): ApiJson<CreateTagRequest>,
) -> Created<TicketTag> {
    let mut checks = Checks::new();
    checks
        .required("name", &req.name)
        .color("color", req.color.as_deref());
    checks.finish()?;

    let name = req.name.trim().to_string();
    let color = req.color;
    let tag = state
        .db
        .call(move |db| db.create_tag(&name, color.as_deref()))
        .await?;
    Ok(created(tag, "Ticket tag created successfully"))
}

async fn get_tag(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<TicketTag> {
    let tag = state.db.call(move |db| db.get_tag(id)).await?;
    Ok(ok(found(tag, "Ticket tag", id)?, "Ticket tag retrieved successfully"))
}

async fn update_tag(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateTagRequest>,
) -> Reply<TicketTag> {
    let mut checks = Checks::new();
    checks
        .required_opt("name", req.name.as_deref())
        .color("color", req.color.as_ref().and_then(|c| c.as_deref()));
    checks.finish()?;

    let changes = TagChanges {
        name: req.name.map(|n| n.trim().to_string()),
        color: req.color,
    };
    let tag = state.db.call(move |db| db.update_tag(id, &changes)).await?;
    Ok(ok(tag, "Ticket tag updated successfully"))
}

async fn archive_tag(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<TicketTag> {
    let tag = state
        .db
        .call(move |db| db.set_tag_archived(id, true))
        .await?;
    Ok(ok(tag, "Ticket tag archived successfully"))
}

async fn restore_tag(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<TicketTag> {
    let tag = state
        .db
        .call(move |db| db.set_tag_archived(id, false))
        .await?;
    Ok(ok(tag, "Ticket tag restored successfully"))
}
