use axum::{
    Router,
    extract::State,
    routing::{get, put},
};
use helpdesk_common::models::Client;
use serde::Deserialize;

use super::extract::{ApiJson, ApiPath, ApiQuery, double_option};
use super::{ArchiveQuery, Created, ListParams, Reply, SharedState, created, found, listed, ok};
use crate::desk::auth::CurrentAdmin;
use crate::desk::db::{ArchiveFilter, ClientChanges, NewClient};
use crate::desk::validate::Checks;

const SORTS: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "name"),
    ("email", "email"),
    ("created_at", "created_at"),
];

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/clients", get(list_clients).post(create_client))
        .route("/clients/{id}", get(get_client).put(update_client))
        .route("/clients/{id}/archive", put(archive_client))
        .route("/clients/{id}/restore", put(restore_client))
}

#[derive(Deserialize)]
pub struct CreateClientRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
}

/// Blank phone numbers are stored as `NULL`.
fn normalize_phone(phone: Option<String>) -> Option<String> {
    phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

async fn list_clients(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiQuery(params): ApiQuery<ListParams>,
    ApiQuery(query): ApiQuery<ArchiveQuery>,
) -> Reply<Vec<Client>> {
    let (sort, page) = params.resolve(&state.pagination, SORTS)?;
    let filter = ArchiveFilter::from(query);
    let clients = state
        .db
        .call(move |db| db.list_clients(&filter, sort, page))
        .await?;
    Ok(listed(clients, "Clients retrieved successfully"))
}

async fn create_client(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiJson(req): ApiJson<CreateClientRequest>,
) -> Created<Client> {
    let mut checks = Checks::new();
    checks
        .required("name", &req.name)
        .required("email", &req.email)
        .email("email", &req.email);
    checks.finish()?;

    let client = NewClient {
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        phone: normalize_phone(req.phone),
    };
    let client = state.db.call(move |db| db.create_client(&client)).await?;
    tracing::info!(client_id = client.id, by = current.admin.id, "client created");
    Ok(created(client, "Client created successfully"))
}

async fn get_client(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Client> {
    let client = state.db.call(move |db| db.get_client(id)).await?;
    Ok(ok(found(client, "Client", id)?, "Client retrieved successfully"))
}

async fn update_client(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateClientRequest>,
) -> Reply<Client> {
    let mut checks = Checks::new();
    checks
        .required_opt("name", req.name.as_deref())
        .required_opt("email", req.email.as_deref())
        .email_opt("email", req.email.as_deref());
    checks.finish()?;

    let changes = ClientChanges {
        name: req.name.map(|n| n.trim().to_string()),
        email: req.email.map(|e| e.trim().to_string()),
        phone: req.phone.map(normalize_phone),
    };
    let client = state.db.call(move |db| db.update_client(id, &changes)).await?;
    Ok(ok(client, "Client updated successfully"))
}

async fn archive_client(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Client> {
    let client = state
        .db
        .call(move |db| db.set_client_archived(id, true))
        .await?;
    tracing::info!(client_id = id, by = current.admin.id, "client archived");
    Ok(ok(client, "Client archived successfully"))
}

async fn restore_client(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Client> {
    let client = state
        .db
        .call(move |db| db.set_client_archived(id, false))
        .await?;
    Ok(ok(client, "Client restored successfully"))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_operator_manages_clients() {
        let state = test_state();
        let token = operator(&state);
        let app = test_app(&state);

        let (status, body) = send(
            &app,
            "POST",
            "/api/clients",
            Some(&token),
            Some(json!({"name": "Acme", "email": "ops@acme.test", "phone": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body["data"]["phone"].is_null());
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/clients/{}", id),
            Some(&token),
            Some(json!({"phone": "+1 555 0100"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["phone"], "+1 555 0100");
        assert_eq!(body["message"], "Client updated successfully");

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/clients/{}", id),
            Some(&token),
            Some(json!({"phone": null})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["phone"].is_null());
    }

    #[tokio::test]
    async fn test_client_validation_and_duplicates() {
        let state = test_state();
        let token = operator(&state);
        let app = test_app(&state);

        let (status, body) = send(
            &app,
            "POST",
            "/api/clients",
            Some(&token),
            Some(json!({"name": "Acme", "email": "not-an-email"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["email"].is_array());

        let payload = json!({"name": "Acme", "email": "ops@acme.test"});
        send(&app, "POST", "/api/clients", Some(&token), Some(payload.clone())).await;
        let (status, body) = send(&app, "POST", "/api/clients", Some(&token), Some(payload)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Client with this email already exists");
    }

    #[tokio::test]
    async fn test_archive_and_restore_client() {
        let state = test_state();
        let token = operator(&state);
        let app = test_app(&state);
        send(
            &app,
            "POST",
            "/api/clients",
            Some(&token),
            Some(json!({"name": "Acme", "email": "ops@acme.test"})),
        )
        .await;

        let (status, _) = send(&app, "PUT", "/api/clients/1/restore", Some(&token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, body) = send(&app, "PUT", "/api/clients/1/archive", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_archived"], true);

        let (_, body) = send(&app, "GET", "/api/clients", Some(&token), None).await;
        assert_eq!(body["meta"]["pagination"]["total"], 0);
        let (_, body) =
            send(&app, "GET", "/api/clients?is_archived=true", Some(&token), None).await;
        assert_eq!(body["meta"]["pagination"]["total"], 1);

        let (status, _) = send(&app, "PUT", "/api/clients/42/archive", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
