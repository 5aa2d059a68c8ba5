use axum::{
    Router,
    extract::State,
    routing::{delete, get, post, put},
};
use helpdesk_common::models::{Ticket, TicketPriority, TicketStatus};
use serde::Deserialize;

use super::extract::{ApiJson, ApiPath, ApiQuery, double_option};
use super::{Created, ListParams, Reply, SharedState, created, found, listed, ok};
use crate::desk::auth::CurrentAdmin;
use crate::desk::db::{NewTicket, TicketChanges, TicketFilter};
use crate::desk::validate::Checks;

const SORTS: &[(&str, &str)] = &[
    ("id", "t.id"),
    ("subject", "t.subject"),
    ("status", "t.status"),
    (
        "priority",
        "CASE t.priority WHEN 'low' THEN 0 WHEN 'medium' THEN 1 WHEN 'high' THEN 2 ELSE 3 END",
    ),
    ("created_at", "t.created_at"),
    ("updated_at", "t.updated_at"),
];

pub fn routes() -> Router<SharedState> {
    Router::new()
        .route("/tickets", get(list_tickets).post(create_ticket))
        .route("/tickets/{id}", get(get_ticket).put(update_ticket))
        .route("/tickets/{id}/archive", put(archive_ticket))
        .route("/tickets/{id}/restore", put(restore_ticket))
        .route("/tickets/{id}/assignments", post(assign_ticket))
        .route(
            "/tickets/{id}/assignments/{assignment_id}",
            delete(unassign_ticket),
        )
}

#[derive(Deserialize)]
pub struct TicketQuery {
    pub search: Option<String>,
    pub is_archived: Option<bool>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub client_id: Option<i64>,
    pub channel_id: Option<i64>,
    pub category_id: Option<i64>,
    pub tag_id: Option<i64>,
    pub admin_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct CreateTicketRequest {
    #[serde(default)]
    pub subject: String,
    pub description: Option<String>,
    pub client_id: Option<i64>,
    pub channel_id: Option<i64>,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

#[derive(Deserialize)]
pub struct UpdateTicketRequest {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<i64>>,
    pub tag_ids: Option<Vec<i64>>,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub admin_id: Option<i64>,
}

async fn list_tickets(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiQuery(params): ApiQuery<ListParams>,
    ApiQuery(query): ApiQuery<TicketQuery>,
) -> Reply<Vec<Ticket>> {
    let (sort, page) = params.resolve(&state.pagination, SORTS)?;
    let filter = TicketFilter {
        search: query.search,
        is_archived: query.is_archived.unwrap_or(false),
        status: query.status,
        priority: query.priority,
        client_id: query.client_id,
        channel_id: query.channel_id,
        category_id: query.category_id,
        tag_id: query.tag_id,
        admin_id: query.admin_id,
    };
    let tickets = state
        .db
        .call(move |db| db.list_tickets(&filter, sort, page))
        .await?;
    Ok(listed(tickets, "Tickets retrieved successfully"))
}

async fn create_ticket(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiJson(req): ApiJson<CreateTicketRequest>,
) -> Created<Ticket> {
    let mut checks = Checks::new();
    checks.required("subject", &req.subject);
    if req.client_id.is_none() {
        checks.add("client_id", "The client id field is required.");
    }
    if req.channel_id.is_none() {
        checks.add("channel_id", "The channel id field is required.");
    }
    checks.finish()?;

    let ticket = NewTicket {
        subject: req.subject.trim().to_string(),
        description: req.description.unwrap_or_default(),
        client_id: req.client_id.unwrap_or_default(),
        channel_id: req.channel_id.unwrap_or_default(),
        category_id: req.category_id,
        tag_ids: req.tag_ids,
        status: req.status.unwrap_or(TicketStatus::Open),
        priority: req.priority.unwrap_or(TicketPriority::Medium),
    };
    let ticket = state.db.call(move |db| db.create_ticket(&ticket)).await?;
    tracing::info!(
        ticket_id = ticket.id,
        client_id = ticket.client.id,
        by = current.admin.id,
        "ticket created"
    );
    Ok(created(ticket, "Ticket created successfully"))
}

async fn get_ticket(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Ticket> {
    let ticket = state.db.call(move |db| db.get_ticket(id)).await?;
    Ok(ok(found(ticket, "Ticket", id)?, "Ticket retrieved successfully"))
}

async fn update_ticket(
    State(state): State<SharedState>,
    _current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateTicketRequest>,
) -> Reply<Ticket> {
    let mut checks = Checks::new();
    checks.required_opt("subject", req.subject.as_deref());
    checks.finish()?;

    let changes = TicketChanges {
        subject: req.subject.map(|s| s.trim().to_string()),
        description: req.description,
        status: req.status,
        priority: req.priority,
        category_id: req.category_id,
        tag_ids: req.tag_ids,
    };
    let ticket = state
        .db
        .call(move |db| db.update_ticket(id, &changes))
        .await?;
    Ok(ok(ticket, "Ticket updated successfully"))
}

async fn archive_ticket(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Ticket> {
    let ticket = state
        .db
        .call(move |db| db.set_ticket_archived(id, true))
        .await?;
    tracing::info!(ticket_id = id, by = current.admin.id, "ticket archived");
    Ok(ok(ticket, "Ticket archived successfully"))
}

async fn restore_ticket(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
) -> Reply<Ticket> {
    let ticket = state
        .db
        .call(move |db| db.set_ticket_archived(id, false))
        .await?;
    tracing::info!(ticket_id = id, by = current.admin.id, "ticket restored");
    Ok(ok(ticket, "Ticket restored successfully"))
}

async fn assign_ticket(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<AssignRequest>,
) -> Created<Ticket> {
    let mut checks = Checks::new();
    if req.admin_id.is_none() {
        checks.add("admin_id", "The admin id field is required.");
    }
    checks.finish()?;

    let admin_id = req.admin_id.unwrap_or_default();
    let assigned_by = current.admin.id;
    let ticket = state
        .db
        .call(move |db| db.assign_ticket(id, admin_id, Some(assigned_by)))
        .await?;
    tracing::info!(ticket_id = id, admin_id, by = assigned_by, "admin assigned to ticket");
    Ok(created(ticket, "Admin assigned successfully"))
}

async fn unassign_ticket(
    State(state): State<SharedState>,
    current: CurrentAdmin,
    ApiPath((id, assignment_id)): ApiPath<(i64, i64)>,
) -> Reply<Ticket> {
    let ticket = state
        .db
        .call(move |db| db.unassign_ticket(id, assignment_id))
        .await?;
    tracing::info!(ticket_id = id, assignment_id, by = current.admin.id, "assignment removed");
    Ok(ok(ticket, "Assignment removed successfully"))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::desk::db::NewClient;
    use axum::http::StatusCode;
    use helpdesk_common::models::AdminRole;
    use serde_json::json;

    /// Seed one client (id 1) and one channel (id 1).
    fn seed_refs(state: &SharedState) {
        let db = state.db.lock_sync().unwrap();
        db.create_client(&NewClient {
            name: "Acme".into(),
            email: "ops@acme.test".into(),
            phone: None,
        })
        .unwrap();
        db.create_channel("Email", "").unwrap();
    }

    #[tokio::test]
    async fn test_create_and_fetch_ticket() {
        let state = test_state();
        let token = operator(&state);
        seed_refs(&state);
        let app = test_app(&state);

        let (status, body) = send(
            &app,
            "POST",
            "/api/tickets",
            Some(&token),
            Some(json!({
                "subject": "Cannot log in",
                "client_id": 1,
                "channel_id": 1,
                "priority": "high"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "open");
        assert_eq!(body["data"]["priority"], "high");
        assert_eq!(body["data"]["client"]["name"], "Acme");
        assert!(body["data"]["category"].is_null());
        let id = body["data"]["id"].as_i64().unwrap();

        let (status, body) =
            send(&app, "GET", &format!("/api/tickets/{}", id), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["channel"]["name"], "Email");
    }

    #[tokio::test]
    async fn test_create_ticket_validation() {
        let state = test_state();
        let token = operator(&state);
        seed_refs(&state);
        let app = test_app(&state);

        let (status, body) =
            send(&app, "POST", "/api/tickets", Some(&token), Some(json!({"subject": ""}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errors"]["subject"].is_array());
        assert!(body["errors"]["client_id"].is_array());
        assert!(body["errors"]["channel_id"].is_array());

        let (status, body) = send(
            &app,
            "POST",
            "/api/tickets",
            Some(&token),
            Some(json!({"subject": "Hi", "client_id": 99, "channel_id": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "The selected client is invalid");

        let (status, _) = send(
            &app,
            "POST",
            "/api/tickets",
            Some(&token),
            Some(json!({"subject": "Hi", "client_id": 1, "channel_id": 1, "status": "escalated"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_assignment_lifecycle() {
        let state = test_state();
        let token = operator(&state);
        let (agent, _) = seed_admin(&state, "agent@desk.test", AdminRole::Operator);
        seed_refs(&state);
        let app = test_app(&state);
        send(
            &app,
            "POST",
            "/api/tickets",
            Some(&token),
            Some(json!({"subject": "Refund", "client_id": 1, "channel_id": 1})),
        )
        .await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/tickets/1/assignments",
            Some(&token),
            Some(json!({"admin_id": agent.id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let assignment = &body["data"]["assignments"][0];
        assert_eq!(assignment["admin"]["id"], agent.id);
        let assignment_id = assignment["id"].as_i64().unwrap();

        let (status, body) = send(
            &app,
            "POST",
            "/api/tickets/1/assignments",
            Some(&token),
            Some(json!({"admin_id": agent.id})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "Admin is already assigned to this ticket");

        let (_, body) = send(
            &app,
            "GET",
            &format!("/api/tickets?admin_id={}", agent.id),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["meta"]["pagination"]["total"], 1);

        let uri = format!("/api/tickets/1/assignments/{}", assignment_id);
        let (status, body) = send(&app, "DELETE", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["assignments"].as_array().unwrap().is_empty());

        let (status, _) = send(&app, "DELETE", &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_update_and_archive_ticket() {
        let state = test_state();
        let token = operator(&state);
        seed_refs(&state);
        let app = test_app(&state);
        send(
            &app,
            "POST",
            "/api/tickets",
            Some(&token),
            Some(json!({"subject": "Slow site", "client_id": 1, "channel_id": 1})),
        )
        .await;

        let (status, body) = send(
            &app,
            "PUT",
            "/api/tickets/1",
            Some(&token),
            Some(json!({"status": "pending", "priority": "urgent"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "pending");
        assert_eq!(body["data"]["subject"], "Slow site");

        let (status, _) = send(&app, "PUT", "/api/tickets/1/archive", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(
            &app,
            "PUT",
            "/api/tickets/1",
            Some(&token),
            Some(json!({"status": "closed"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, body) =
            send(&app, "GET", "/api/tickets?status=pending", Some(&token), None).await;
        assert_eq!(body["meta"]["pagination"]["total"], 0);
        let (_, body) = send(
            &app,
            "GET",
            "/api/tickets?status=pending&is_archived=true",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(body["meta"]["pagination"]["total"], 1);
    }

    #[tokio::test]
    async fn test_sort_by_priority_follows_severity() {
        let state = test_state();
        let token = operator(&state);
        seed_refs(&state);
        let app = test_app(&state);
        for priority in ["urgent", "low", "high", "medium"] {
            let (status, _) = send(
                &app,
                "POST",
                "/api/tickets",
                Some(&token),
                Some(json!({
                    "subject": format!("{} ticket", priority),
                    "client_id": 1,
                    "channel_id": 1,
                    "priority": priority
                })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let priorities = |body: &serde_json::Value| -> Vec<String> {
            body["data"]
                .as_array()
                .unwrap()
                .iter()
                .map(|t| t["priority"].as_str().unwrap().to_string())
                .collect()
        };
        let (status, body) = send(
            &app,
            "GET",
            "/api/tickets?sort_by=priority&sort_order=asc",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(priorities(&body), ["low", "medium", "high", "urgent"]);

        let (_, body) = send(
            &app,
            "GET",
            "/api/tickets?sort_by=priority&sort_order=desc",
            Some(&token),
            None,
        )
        .await;
        assert_eq!(priorities(&body), ["urgent", "high", "medium", "low"]);
    }
}
