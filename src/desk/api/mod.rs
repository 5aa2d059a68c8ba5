//! REST surface of the help desk, mounted under `/api`.
//!
//! Every handler answers with the `{ data, message, meta? }` envelope from
//! `helpdesk_common`; failures go through `DeskError`'s `IntoResponse`.

use std::sync::Arc;

use axum::{Json, Router, http::StatusCode, routing::get};
use helpdesk_common::{ApiResponse, Page, PageRequest};
use serde::Deserialize;
use tower_cookies::CookieManagerLayer;

use super::db::{ArchiveFilter, DbHandle, Sort, SortOrder};
use super::validate::Checks;
use crate::config::{AuthSection, PaginationSection};
use crate::errors::{DeskError, DeskResult};

mod actions;
mod admins;
mod auth;
mod catalog;
mod channels;
mod clients;
pub mod extract;
mod tickets;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub auth: AuthSection,
    pub pagination: PaginationSection,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn shared(db: DbHandle, auth: AuthSection, pagination: PaginationSection) -> SharedState {
        Arc::new(Self {
            db,
            auth,
            pagination,
        })
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    let api = Router::new()
        .merge(auth::routes())
        .merge(admins::routes())
        .merge(clients::routes())
        .merge(channels::routes())
        .merge(catalog::routes())
        .merge(tickets::routes())
        .merge(actions::routes());

    Router::new()
        .nest("/api", api)
        .route("/health", get(health_check))
        .layer(CookieManagerLayer::new())
}

async fn health_check() -> &'static str {
    "ok"
}

// ── Listing parameters ────────────────────────────────────────────────

/// `page`, `per_page`, `sort_by` and `sort_order`, accepted by every list
/// endpoint next to its own filters.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl ListParams {
    /// Validate paging against the configured limits and resolve `sort_by`
    /// against the endpoint's whitelist.
    pub fn resolve(
        &self,
        settings: &PaginationSection,
        sorts: &[(&'static str, &'static str)],
    ) -> DeskResult<(Sort, PageRequest)> {
        let page = self.page.unwrap_or(1);
        let per_page = self.per_page.unwrap_or(settings.default_per_page);

        let mut checks = Checks::new();
        if page < 1 {
            checks.add("page", "The page field must be at least 1.");
        }
        if per_page < 1 {
            checks.add("per_page", "The per page field must be at least 1.");
        }
        checks.finish()?;

        let sort = Sort::resolve(self.sort_by.as_deref(), self.sort_order, sorts)?;
        let max_per_page = settings.max_per_page.max(1);
        Ok((sort, PageRequest::new(page, per_page.min(max_per_page))))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ArchiveQuery {
    pub search: Option<String>,
    pub is_archived: Option<bool>,
}

impl From<ArchiveQuery> for ArchiveFilter {
    fn from(q: ArchiveQuery) -> Self {
        Self {
            search: q.search,
            is_archived: q.is_archived.unwrap_or(false),
        }
    }
}

// ── Response helpers ──────────────────────────────────────────────────

pub type Reply<T> = DeskResult<Json<ApiResponse<T>>>;
pub type Created<T> = DeskResult<(StatusCode, Json<ApiResponse<T>>)>;

fn ok<T>(data: T, message: &str) -> Json<ApiResponse<T>> {
    Json(ApiResponse::new(data, message))
}

fn created<T>(data: T, message: &str) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(ApiResponse::new(data, message)))
}

fn listed<T>(page: Page<T>, message: &str) -> Json<ApiResponse<Vec<T>>> {
    Json(ApiResponse::paginated(page, message))
}

/// Turn a storage lookup into a 404 when the record is missing.
fn found<T>(record: Option<T>, entity: &'static str, id: i64) -> DeskResult<T> {
    record.ok_or(DeskError::not_found(entity, id))
}

// ── Test support ──────────────────────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let state = test_state();
        let (status, body) = send(&test_app(&state), "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::Value::String("ok".into()));
    }

    #[tokio::test]
    async fn test_protected_route_requires_session() {
        let state = test_state();
        let app = test_app(&state);
        let (status, body) = send(&app, "GET", "/api/clients", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Unauthenticated");
        assert!(body["data"].is_null());

        let (status, _) = send(&app, "GET", "/api/clients", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_list_params_defaults_and_clamp() {
        let settings = PaginationSection::default();
        let sorts: &[(&str, &str)] = &[("id", "id")];

        let (_, page) = ListParams::default().resolve(&settings, sorts).unwrap();
        assert_eq!(page, PageRequest::new(1, 10));

        let params = ListParams {
            per_page: Some(5_000),
            ..Default::default()
        };
        let (_, page) = params.resolve(&settings, sorts).unwrap();
        assert_eq!(page.per_page, 100);
    }

    #[test]
    fn test_list_params_survive_zero_max_per_page() {
        let settings = PaginationSection {
            default_per_page: 10,
            max_per_page: 0,
        };
        let (_, page) = ListParams::default().resolve(&settings, &[("id", "id")]).unwrap();
        assert_eq!(page.per_page, 1);
    }

    #[tokio::test]
    async fn test_zero_max_per_page_still_lists() {
        let db = crate::desk::db::DeskDb::new_in_memory().unwrap();
        db.create_channel("Email", "").unwrap();
        let state = AppState::shared(
            DbHandle::new(db),
            AuthSection::default(),
            PaginationSection {
                default_per_page: 10,
                max_per_page: 0,
            },
        );
        let token = super_admin(&state);
        let (status, body) =
            send(&test_app(&state), "GET", "/api/channels", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["meta"]["pagination"]["per_page"], 1);
        assert_eq!(body["meta"]["pagination"]["last_page"], 1);
    }

    #[test]
    fn test_list_params_reject_non_positive() {
        let settings = PaginationSection::default();
        let params = ListParams {
            page: Some(0),
            per_page: Some(-1),
            ..Default::default()
        };
        match params.resolve(&settings, &[("id", "id")]).unwrap_err() {
            DeskError::Validation { errors, .. } => {
                assert!(errors.contains_key("page"));
                assert!(errors.contains_key("per_page"));
            }
            other => panic!("Expected Validation, got {:?}", other),
        }
    }
}
