use axum::{
    Router,
    extract::State,
    routing::{get, put},
};
use helpdesk_common::models::{Action, ActionField, ActionFieldType};
use serde::Deserialize;

use super::extract::{ApiJson, ApiPath, ApiQuery, double_option};
use super::{Created, ListParams, Reply, SharedState, created, found, listed, ok};
use crate::desk::auth::CurrentAdmin;
use crate::desk::db::{ActionChanges, ActionFilter, NewAction, NewActionField};
use crate::desk::validate::Checks;

const SORTS: &[(&str, &str)] = &[
    ("id", "a.id"),
    ("name", "a.name"),
    ("created_at", "a.created_at"),
];

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/actions", get(list_actions).post(create_action))
        .route("/actions/{id}", get(get_action).put(update_action))
        .route("/actions/{id}/archive", put(archive_action))
        .route("/actions/{id}/restore", put(restore_action))
        .route("/actions/{id}/enable", put(enable_action))
        .route("/actions/{id}/disable", put(disable_action))
        .route("/actions/{id}/fields", get(list_action_fields))
}

#[derive(Deserialize)]
pub struct ActionQuery {
    pub search: Option<String>,
    pub is_archived: Option<bool>,
    pub is_enabled: Option<bool>,
    pub channel_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct FieldPayload {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    pub field_type: Option<ActionFieldType>,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub options: Vec<String>,
}

impl From<FieldPayload> for NewActionField {
    fn from(p: FieldPayload) -> Self {
        Self {
            name: p.name.trim().to_string(),
            label: p.label.trim().to_string(),
            field_type: p.field_type.unwrap_or(ActionFieldType::Text),
            is_required: p.is_required,
            options: p.options.into_iter().map(|o| o.trim().to_string()).collect(),
        }
    }
}

#[derive(Deserialize)]
pub struct CreateActionRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub channel_id: Option<i64>,
    #[serde(default)]
    pub fields: Vec<FieldPayload>,
}

#[derive(Deserialize)]
pub struct UpdateActionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub channel_id: Option<Option<i64>>,
    pub fields: Option<Vec<FieldPayload>>,
}

async fn list_actions(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiQuery(params): ApiQuery<ListParams>,
    ApiQuery(query): ApiQuery<ActionQuery>,
) -> Reply<Vec<Action>> {
    let (sort, page) = params.resolve(&state.pagination, SORTS)?;
    let filter = ActionFilter {
        search: query.search,
        is_archived: query.is_archived.unwrap_or(false),
        is_enabled: query.is_enabled,
        channel_id: query.channel_id,
    };
    let actions = state
        .db
        .call(move |db| db.list_actions(&filter, sort, page))
        .await?;
    Ok(listed(actions, "Actions retrieved successfully"))
}

async fn create_action(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiJson(req): ApiJson<CreateActionRequest>,
) -> Created<Action> {
    current.require_super_admin()?;
    let mut checks = Checks::new();
    checks.required("name", &req.name);
    checks.finish()?;

    let action = NewAction {
        name: req.name.trim().to_string(),
        description: req.description.unwrap_or_default(),
        channel_id: req.channel_id,
        fields: req.fields.into_iter().map(NewActionField::from).collect(),
    };
    let action = state.db.call(move |db| db.create_action(&action)).await?;
    tracing::info!(
        action_id = action.id,
        fields = action.fields.len(),
        "action created"
    );
    Ok(created(action, "Action created successfully"))
}

async fn get_action(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Action> {
    let action = state.db.call(move |db| db.get_action(id)).await?;
    Ok(ok(found(action, "Action", id)?, "Action retrieved successfully"))
}

async fn update_action(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateActionRequest>,
) -> Reply<Action> {
    current.require_super_admin()?;
    let mut checks = Checks::new();
    checks.required_opt("name", req.name.as_deref());
    checks.finish()?;

    let changes = ActionChanges {
        name: req.name.map(|n| n.trim().to_string()),
        description: req.description,
        channel_id: req.channel_id,
        fields: req
            .fields
            .map(|fields| fields.into_iter().map(NewActionField::from).collect()),
    };
    let action = state
        .db
        .call(move |db| db.update_action(id, &changes))
        .await?;
    Ok(ok(action, "Action updated successfully"))
}

async fn archive_action(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Action> {
    current.require_super_admin()?;
    let action = state
        .db
        .call(move |db| db.set_action_archived(id, true))
        .await?;
    Ok(ok(action, "Action archived successfully"))
}

async fn restore_action(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Action> {
    current.require_super_admin()?;
    let action = state
        .db
        .call(move |db| db.set_action_archived(id, false))
        .await?;
    Ok(ok(action, "Action restored successfully"))
}

async fn enable_action(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Action> {
    current.require_super_admin()?;
    let action = state
        .db
        .call(move |db| db.set_action_enabled(id, true))
        .await?;
    Ok(ok(action, "Action enabled successfully"))
}

async fn disable_action(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Action> {
    current.require_super_admin()?;
    let action = state
        .db
        .call(move |db| db.set_action_enabled(id, false))
        .await?;
    Ok(ok(action, "Action disabled successfully"))
}

async fn list_action_fields(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Vec<ActionField>> {
    let fields = state.db.call(move |db| db.list_action_fields(id)).await?;
    Ok(ok(fields, "Action fields retrieved successfully"))
}
