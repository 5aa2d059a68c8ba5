use axum::{
    Router,
    extract::State,
    routing::{get, put},
};
use helpdesk_common::models::Channel;
use serde::Deserialize;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::{ArchiveQuery, Created, ListParams, Reply, SharedState, created, found, listed, ok};
use crate::desk::auth::CurrentAdmin;
use crate::desk::db::{ArchiveFilter, ChannelChanges};
use crate::desk::validate::Checks;

const SORTS: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "name"),
    ("created_at", "created_at"),
];

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/channels", get(list_channels).post(create_channel))
        .route("/channels/{id}", get(get_channel).put(update_channel))
        .route("/channels/{id}/archive", put(archive_channel))
        .route("/channels/{id}/restore", put(restore_channel))
}

#[derive(Deserialize)]
pub struct CreateChannelRequest {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateChannelRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

async fn list_channels(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiQuery(params): ApiQuery<ListParams>,
    ApiQuery(query): ApiQuery<ArchiveQuery>,
) -> Reply<Vec<Channel>> {
    let (sort, page) = params.resolve(&state.pagination, SORTS)?;
    let filter = ArchiveFilter::from(query);
    let channels = state
        .db
        .call(move |db| db.list_channels(&filter, sort, page))
        .await?;
    Ok(listed(channels, "Channels retrieved successfully"))
}

async fn create_channel(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiJson(req): ApiJson<CreateChannelRequest>,
) -> Created<Channel> {
    current.require_super_admin()?;
    let mut checks = Checks::new();
    checks.required("name", &req.name);
    checks.finish()?;

    let name = req.name.trim().to_string();
    let description = req.description.unwrap_or_default();
    let channel = state
        .db
        .call(move |db| db.create_channel(&name, &description))
        .await?;
    tracing::info!(channel_id = channel.id, name = %channel.name, "channel created");
    Ok(created(channel, "Channel created successfully"))
}

async fn get_channel(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Channel> {
    let channel = state.db.call(move |db| db.get_channel(id)).await?;
    Ok(ok(found(channel, "Channel", id)?, "Channel retrieved successfully"))
}

async fn update_channel(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateChannelRequest>,
) -> Reply<Channel> {
    current.require_super_admin()?;
    let mut checks = Checks::new();
    checks.required_opt("name", req.name.as_deref());
    checks.finish()?;

    let changes = ChannelChanges {
        name: req.name.map(|n| n.trim().to_string()),
        description: req.description,
    };
    let channel = state
        .db
        .call(move |db| db.update_channel(id, &changes))
        .await?;
    Ok(ok(channel, "Channel updated successfully"))
}

async fn archive_channel(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Channel> {
    current.require_super_admin()?;
    let channel = state
        .db
        .call(move |db| db.set_channel_archived(id, true))
        .await?;
    tracing::info!(channel_id = id, "channel archived");
    Ok(ok(channel, "Channel archived successfully"))
}

async fn restore_channel(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Channel> {
    current.require_super_admin()?;
    let channel = state
        .db
        .call(move |db| db.set_channel_archived(id, false))
        .await?;
    Ok(ok(channel, "Channel restored successfully"))
}
