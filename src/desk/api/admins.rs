use anyhow::Context;
use axum::{
    Router,
    extract::State,
    routing::{get, put},
};
use helpdesk_common::models::{Admin, AdminRole};
use serde::Deserialize;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::{Created, ListParams, Reply, SharedState, created, found, listed, ok};
use crate::desk::auth::{CurrentAdmin, hash_password};
use crate::desk::db::{AdminChanges, AdminFilter, NewAdmin};
use crate::desk::validate::Checks;
use crate::errors::DeskError;

const SORTS: &[(&str, &str)] = &[
    ("id", "id"),
    ("name", "name"),
    ("email", "email"),
    ("role", "role"),
    ("created_at", "created_at"),
];

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/admins", get(list_admins).post(create_admin))
        .route("/admins/{id}", get(get_admin).put(update_admin))
        .route("/admins/{id}/activate", put(activate_admin))
        .route("/admins/{id}/deactivate", put(deactivate_admin))
}

#[derive(Deserialize)]
pub struct AdminQuery {
    pub search: Option<String>,
    pub role: Option<AdminRole>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreateAdminRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub role: Option<AdminRole>,
}

#[derive(Deserialize)]
pub struct UpdateAdminRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<AdminRole>,
}

async fn hash_off_thread(password: String) -> anyhow::Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("Password hashing task panicked")?
}

async fn list_admins(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiQuery(params): ApiQuery<ListParams>,
    ApiQuery(query): ApiQuery<AdminQuery>,
) -> Reply<Vec<Admin>> {
    let (sort, page) = params.resolve(&state.pagination, SORTS)?;
    let filter = AdminFilter {
        search: query.search,
        role: query.role,
        is_active: query.is_active,
    };
    let admins = state
        .db
        .call(move |db| db.list_admins(&filter, sort, page))
        .await?;
    Ok(listed(admins, "Admins retrieved successfully"))
}

async fn create_admin(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiJson(req): ApiJson<CreateAdminRequest>,
) -> Created<Admin> {
    current.require_super_admin()?;
    let mut checks = Checks::new();
    checks
        .required("name", &req.name)
        .required("email", &req.email)
        .email("email", &req.email)
        .password("password", &req.password);
    checks.finish()?;

    let admin = NewAdmin {
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        password_hash: hash_off_thread(req.password).await?,
        role: req.role.unwrap_or(AdminRole::Operator),
    };
    let admin = state.db.call(move |db| db.create_admin(&admin)).await?;
    tracing::info!(
        admin_id = admin.id,
        role = admin.role.as_str(),
        created_by = current.admin.id,
        "admin created"
    );
    Ok(created(admin, "Admin created successfully"))
}

async fn get_admin(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Admin> {
    let admin = state.db.call(move |db| db.get_admin(id)).await?;
    Ok(ok(found(admin, "Admin", id)?, "Admin retrieved successfully"))
}

/// Super admins may edit anyone. Everybody may edit their own name, email
/// and password, but only a super admin may touch a role.
async fn update_admin(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateAdminRequest>,
) -> Reply<Admin> {
    if current.admin.id != id || req.role.is_some() {
        current.require_super_admin()?;
    }
    let mut checks = Checks::new();
    checks
        .required_opt("name", req.name.as_deref())
        .required_opt("email", req.email.as_deref())
        .email_opt("email", req.email.as_deref());
    if let Some(password) = &req.password {
        checks.password("password", password);
    }
    checks.finish()?;

    let password_hash = match req.password {
        Some(password) => Some(hash_off_thread(password).await?),
        None => None,
    };
    let changes = AdminChanges {
        name: req.name.map(|n| n.trim().to_string()),
        email: req.email.map(|e| e.trim().to_string()),
        password_hash,
        role: req.role,
    };
    let admin = state.db.call(move |db| db.update_admin(id, &changes)).await?;
    Ok(ok(admin, "Admin updated successfully"))
}

async fn activate_admin(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Admin> {
    current.require_super_admin()?;
    let admin = state.db.call(move |db| db.set_admin_active(id, true)).await?;
    tracing::info!(admin_id = id, by = current.admin.id, "admin activated");
    Ok(ok(admin, "Admin activated successfully"))
}

async fn deactivate_admin(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Admin> {
    current.require_super_admin()?;
    if current.admin.id == id {
        return Err(DeskError::Conflict(
            "You cannot deactivate your own account".to_string(),
        ));
    }
    let admin = state.db.call(move |db| db.set_admin_active(id, false)).await?;
    tracing::info!(admin_id = id, by = current.admin.id, "admin deactivated");
    Ok(ok(admin, "Admin deactivated successfully"))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_operator_cannot_create_admins() {
        let state = test_state();
        super_admin(&state);
        let token = operator(&state);
        let (status, body) = send(
            &test_app(&state),
            "POST",
            "/api/admins",
            Some(&token),
            Some(json!({"name": "New", "email": "new@desk.test", "password": "longenough"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "This action requires super admin privileges");
    }

    #[tokio::test]
    async fn test_super_admin_creates_operator_by_default() {
        let state = test_state();
        let token = super_admin(&state);
        let app = test_app(&state);
        let (status, body) = send(
            &app,
            "POST",
            "/api/admins",
            Some(&token),
            Some(json!({"name": "New", "email": "new@desk.test", "password": "longenough"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["role"], "operator");
        assert_eq!(body["message"], "Admin created successfully");

        let (status, body) = send(
            &app,
            "POST",
            "/api/admins",
            Some(&token),
            Some(json!({"name": "Again", "email": "NEW@desk.test", "password": "longenough"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["message"], "Admin with this email already exists");
    }

    #[tokio::test]
    async fn test_operator_edits_self_but_not_role() {
        let state = test_state();
        super_admin(&state);
        let (op, token) = seed_admin(&state, "op@desk.test", AdminRole::Operator);
        let app = test_app(&state);
        let uri = format!("/api/admins/{}", op.id);

        let (status, body) =
            send(&app, "PUT", &uri, Some(&token), Some(json!({"name": "Renamed"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Renamed");

        let (status, _) =
            send(&app, "PUT", &uri, Some(&token), Some(json!({"role": "super_admin"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) =
            send(&app, "PUT", "/api/admins/1", Some(&token), Some(json!({"name": "Hacked"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_deactivate_rules() {
        let state = test_state();
        let (root, token) = seed_admin(&state, "root@desk.test", AdminRole::SuperAdmin);
        let (op, op_token) = seed_admin(&state, "op@desk.test", AdminRole::Operator);
        let app = test_app(&state);

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/admins/{}/deactivate", root.id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "You cannot deactivate your own account");

        let uri = format!("/api/admins/{}/deactivate", op.id);
        let (status, body) = send(&app, "PUT", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_active"], false);

        // Deactivation revoked the operator's session
        let (status, _) = send(&app, "GET", "/api/me", Some(&op_token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "PUT", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/admins/{}/activate", op.id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_active"], true);
    }

    #[tokio::test]
    async fn test_list_admins_filters_and_paginates() {
        let state = test_state();
        let token = super_admin(&state);
        for i in 0..3 {
            seed_admin(&state, &format!("op{}@desk.test", i), AdminRole::Operator);
        }
        let app = test_app(&state);

        let (status, body) = send(
            &app,
            "GET",
            "/api/admins?role=operator&per_page=2&sort_by=email&sort_order=asc",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["data"][0]["email"], "op0@desk.test");
        assert_eq!(body["meta"]["pagination"]["total"], 3);
        assert_eq!(body["meta"]["pagination"]["last_page"], 2);

        let (status, _) =
            send(&app, "GET", "/api/admins?sort_by=password_hash", Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "GET", "/api/admins/999", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
