use anyhow::Context;
use axum::{Router, extract::State, routing::{get, post}};
use helpdesk_common::models::{Admin, AdminRole};
use serde::Deserialize;
use tower_cookies::Cookies;

use super::extract::ApiJson;
use super::{Created, Reply, SharedState, created, ok};
use crate::desk::auth::{
    CurrentAdmin, hash_password, new_session_token, now_unix, removal_cookie, session_cookie,
    token_digest, verify_password,
};
use crate::desk::db::NewAdmin;
use crate::desk::validate::Checks;
use crate::errors::{DeskError, DeskResult};

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Issue a session for `admin_id` and hand its token out as a cookie.
async fn start_session(state: &SharedState, cookies: &Cookies, admin_id: i64) -> DeskResult<()> {
    let token = new_session_token();
    let digest = token_digest(&token);
    let expires_at = now_unix() + state.auth.session_ttl_hours * 3600;
    state
        .db
        .call(move |db| db.create_session(&digest, admin_id, expires_at))
        .await?;
    cookies.add(session_cookie(&state.auth, token));
    Ok(())
}

async fn login(
    State(state): State<SharedState>,
    cookies: Cookies,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Reply<Admin> {
    let mut checks = Checks::new();
    checks.required("email", &req.email).required("password", &req.password);
    checks.finish()?;

    let email = req.email.trim().to_string();
    let lookup = email.clone();
    let credentials = state
        .db
        .call(move |db| {
            db.purge_expired_sessions(now_unix())?;
            db.find_admin_credentials(&lookup)
        })
        .await?;

    let Some((admin, hash)) = credentials else {
        tracing::warn!(email = %email, "login failed: unknown email");
        return Err(DeskError::InvalidCredentials);
    };
    let password = req.password;
    let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .context("Password verification task panicked")??;
    if !verified {
        tracing::warn!(admin_id = admin.id, "login failed: wrong password");
        return Err(DeskError::InvalidCredentials);
    }
    if !admin.is_active {
        tracing::warn!(admin_id = admin.id, "login refused: account deactivated");
        return Err(DeskError::Forbidden(
            "Your account has been deactivated".to_string(),
        ));
    }

    start_session(&state, &cookies, admin.id).await?;
    tracing::info!(admin_id = admin.id, "admin logged in");
    Ok(ok(admin, "Login successful"))
}

async fn register(
    State(state): State<SharedState>,
    cookies: Cookies,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Created<Admin> {
    if !state.auth.allow_registration {
        return Err(DeskError::Forbidden("Registration is disabled".to_string()));
    }
    let mut checks = Checks::new();
    checks
        .required("name", &req.name)
        .required("email", &req.email)
        .email("email", &req.email)
        .password("password", &req.password);
    checks.finish()?;

    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("Password hashing task panicked")??;
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_string();
    let admin = state
        .db
        .call(move |db| {
            // The very first account bootstraps the desk
            let role = if db.count_admins()? == 0 {
                AdminRole::SuperAdmin
            } else {
                AdminRole::Operator
            };
            db.create_admin(&NewAdmin {
                name,
                email,
                password_hash,
                role,
            })
        })
        .await?;

    start_session(&state, &cookies, admin.id).await?;
    tracing::info!(admin_id = admin.id, role = admin.role.as_str(), "admin registered");
    Ok(created(admin, "Registration successful"))
}

async fn me(current: CurrentAdmin) -> Reply<Admin> {
    Ok(ok(current.admin, "Authenticated admin retrieved successfully"))
}

async fn logout(
    State(state): State<SharedState>,
    cookies: Cookies,
    current: CurrentAdmin,
) -> Reply<()> {
    let digest = current.token_hash.clone();
    state.db.call(move |db| db.delete_session(&digest)).await?;
    cookies.remove(removal_cookie(&state.auth));
    tracing::info!(admin_id = current.admin.id, "admin logged out");
    Ok(ok((), "Logged out successfully"))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    fn seed_with_password(state: &SharedState, email: &str, password: &str, active: bool) -> Admin {
        let db = state.db.lock_sync().unwrap();
        let admin = db
            .create_admin(&NewAdmin {
                name: "Ana".into(),
                email: email.into(),
                password_hash: hash_password(password).unwrap(),
                role: AdminRole::SuperAdmin,
            })
            .unwrap();
        if !active {
            db.create_admin(&NewAdmin {
                name: "Keeper".into(),
                email: "keeper@desk.test".into(),
                password_hash: "x".into(),
                role: AdminRole::SuperAdmin,
            })
            .unwrap();
            db.set_admin_active(admin.id, false).unwrap();
        }
        admin
    }

    fn session_token_from(response: &axum::response::Response) -> String {
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("login should set a cookie")
            .to_str()
            .unwrap();
        assert!(cookie.starts_with("helpdesk_session="));
        assert!(cookie.contains("HttpOnly"));
        cookie["helpdesk_session=".len()..]
            .split(';')
            .next()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_login_sets_cookie_and_me_accepts_it() {
        let state = test_state();
        seed_with_password(&state, "ana@desk.test", "s3cret-pass", true);
        let app = test_app(&state);

        let request = Request::builder()
            .method("POST")
            .uri("/api/login")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"email": "ana@desk.test", "password": "s3cret-pass"})
                    .to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let token = session_token_from(&response);

        let request = Request::builder()
            .method("GET")
            .uri("/api/me")
            .header("cookie", format!("helpdesk_session={}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let state = test_state();
        seed_with_password(&state, "ana@desk.test", "s3cret-pass", true);
        let app = test_app(&state);

        let (status, body) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(serde_json::json!({"email": "ana@desk.test", "password": "nope-nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid email or password");

        let (status, _) = send(
            &app,
            "POST",
            "/api/login",
            None,
            Some(serde_json::json!({"email": "ghost@desk.test", "password": "whatever1"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_deactivated_admin_is_forbidden() {
        let state = test_state();
        seed_with_password(&state, "ana@desk.test", "s3cret-pass", false);
        let (status, body) = send(
            &test_app(&state),
            "POST",
            "/api/login",
            None,
            Some(serde_json::json!({"email": "ana@desk.test", "password": "s3cret-pass"})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Your account has been deactivated");
    }

    #[tokio::test]
    async fn test_first_registration_becomes_super_admin() {
        let state = test_state();
        let app = test_app(&state);

        let (status, body) = send(
            &app,
            "POST",
            "/api/register",
            None,
            Some(serde_json::json!({
                "name": "First",
                "email": "first@desk.test",
                "password": "longenough"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["role"], "super_admin");
        assert!(body["data"].get("password_hash").is_none());

        let (status, body) = send(
            &app,
            "POST",
            "/api/register",
            None,
            Some(serde_json::json!({
                "name": "Second",
                "email": "second@desk.test",
                "password": "longenough"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["role"], "operator");
    }

    #[tokio::test]
    async fn test_register_validates_and_can_be_disabled() {
        let state = test_state();
        let app = test_app(&state);
        let (status, body) = send(
            &app,
            "POST",
            "/api/register",
            None,
            Some(serde_json::json!({"name": "", "email": "bad", "password": "short"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["email"].is_array());
        assert!(body["errors"]["password"].is_array());

        let mut auth = crate::config::AuthSection::default();
        auth.allow_registration = false;
        let closed = super::super::AppState::shared(
            state.db.clone(),
            auth,
            crate::config::PaginationSection::default(),
        );
        let (status, _) = send(
            &test_app(&closed),
            "POST",
            "/api/register",
            None,
            Some(serde_json::json!({
                "name": "X",
                "email": "x@desk.test",
                "password": "longenough"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let state = test_state();
        let token = super_admin(&state);
        let app = test_app(&state);

        let (status, body) = send(&app, "POST", "/api/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"].is_null());

        let (status, _) = send(&app, "GET", "/api/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_deactivated_session_is_rejected() {
        let state = test_state();
        super_admin(&state);
        let (op, token) = seed_admin(&state, "ops@desk.test", AdminRole::Operator);
        {
            // Flip the flag directly so the session survives
            let db = state.db.lock_sync().unwrap();
            db.set_flag("admins", "Admin", op.id, "is_active", false, "x").unwrap();
        }
        let (status, _) = send(&test_app(&state), "GET", "/api/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let db = state.db.lock_sync().unwrap();
        assert!(db.find_session_admin(&token_digest(&token), 0).unwrap().is_none());
    }
}
