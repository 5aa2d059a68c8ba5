//! Tickets, their tag links and their admin assignments.
//!
//! A `Ticket` is always returned hydrated: client, channel and category
//! names come from joins, tags and assignments from follow-up queries.

use anyhow::Context;
use helpdesk_common::models::{
    RecordRef, Ticket, TicketAssignment, TicketPriority, TicketStatus,
};
use helpdesk_common::{Page, PageRequest};
use rusqlite::{OptionalExtension, Row, params};

use super::query::{ListFilter, Sort};
use super::{DeskDb, parse_column};
use crate::errors::{DeskError, DeskResult};

const FROM: &str = "tickets t \
     JOIN clients c ON c.id = t.client_id \
     JOIN channels ch ON ch.id = t.channel_id \
     LEFT JOIN ticket_categories cat ON cat.id = t.category_id";

const COLUMNS: &str = "t.id, t.subject, t.description, t.status, t.priority, \
     t.client_id, c.name, t.channel_id, ch.name, t.category_id, cat.name, \
     t.is_archived, t.created_at, t.updated_at";

const ARCHIVED_TICKET: &str = "Archived tickets cannot be modified";

fn read_ticket(row: &Row<'_>) -> rusqlite::Result<Ticket> {
    let category = match row.get::<_, Option<i64>>(9)? {
        Some(id) => Some(RecordRef {
            id,
            name: row.get(10)?,
        }),
        None => None,
    };
    Ok(Ticket {
        id: row.get(0)?,
        subject: row.get(1)?,
        description: row.get(2)?,
        status: parse_column(row, 3)?,
        priority: parse_column(row, 4)?,
        client: RecordRef {
            id: row.get(5)?,
            name: row.get(6)?,
        },
        channel: RecordRef {
            id: row.get(7)?,
            name: row.get(8)?,
        },
        category,
        tags: Vec::new(),
        assignments: Vec::new(),
        is_archived: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub subject: String,
    pub description: String,
    pub client_id: i64,
    pub channel_id: i64,
    pub category_id: Option<i64>,
    pub tag_ids: Vec<i64>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
}

#[derive(Debug, Clone, Default)]
pub struct TicketChanges {
    pub subject: Option<String>,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    /// `Some(None)` removes the category
    pub category_id: Option<Option<i64>>,
    /// Replaces the whole tag set when present
    pub tag_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub search: Option<String>,
    pub is_archived: bool,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub client_id: Option<i64>,
    pub channel_id: Option<i64>,
    pub category_id: Option<i64>,
    pub tag_id: Option<i64>,
    /// Only tickets assigned to this admin
    pub admin_id: Option<i64>,
}

impl TicketFilter {
    fn to_list_filter(&self) -> ListFilter {
        let mut filter = ListFilter::new();
        filter
            .search(&["t.subject", "t.description"], self.search.as_deref())
            .eq_bool("t.is_archived", Some(self.is_archived))
            .eq_text("t.status", self.status.as_ref().map(TicketStatus::as_str))
            .eq_text("t.priority", self.priority.as_ref().map(TicketPriority::as_str))
            .eq_int("t.client_id", self.client_id)
            .eq_int("t.channel_id", self.channel_id)
            .eq_int("t.category_id", self.category_id)
            .clause_int(
                "EXISTS (SELECT 1 FROM ticket_tag_links l WHERE l.ticket_id = t.id AND l.tag_id = ?)",
                self.tag_id,
            )
            .clause_int(
                "EXISTS (SELECT 1 FROM ticket_assignments a WHERE a.ticket_id = t.id AND a.admin_id = ?)",
                self.admin_id,
            );
        filter
    }
}

impl DeskDb {
    pub fn create_ticket(&self, ticket: &NewTicket) -> DeskResult<Ticket> {
        self.ensure_usable("clients", ticket.client_id, "client_id", "client")?;
        self.ensure_usable("channels", ticket.channel_id, "channel_id", "channel")?;
        if let Some(category_id) = ticket.category_id {
            self.ensure_usable("ticket_categories", category_id, "category_id", "category")?;
        }
        self.ensure_usable_tags(&ticket.tag_ids)?;

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "INSERT INTO tickets (subject, description, status, priority, client_id, channel_id, category_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                ticket.subject,
                ticket.description,
                ticket.status.as_str(),
                ticket.priority.as_str(),
                ticket.client_id,
                ticket.channel_id,
                ticket.category_id,
            ],
        )
        .context("Failed to insert ticket")?;
        let id = tx.last_insert_rowid();
        self.link_tags(id, &ticket.tag_ids)?;
        tx.commit().context("Failed to commit ticket insert")?;

        Ok(self.get_ticket(id)?.context("Ticket not found after insert")?)
    }

    pub fn get_ticket(&self, id: i64) -> DeskResult<Option<Ticket>> {
        let ticket = self
            .conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE t.id = ?1", COLUMNS, FROM),
                params![id],
                read_ticket,
            )
            .optional()
            .context("Failed to query ticket")?;
        match ticket {
            Some(mut ticket) => {
                self.hydrate_ticket(&mut ticket)?;
                Ok(Some(ticket))
            }
            None => Ok(None),
        }
    }

    pub fn list_tickets(
        &self,
        filter: &TicketFilter,
        sort: Sort,
        page: PageRequest,
    ) -> DeskResult<Page<Ticket>> {
        let mut page = self.fetch_page(
            FROM,
            COLUMNS,
            &filter.to_list_filter(),
            sort,
            page,
            read_ticket,
        )?;
        for ticket in &mut page.items {
            self.hydrate_ticket(ticket)?;
        }
        Ok(page)
    }

    pub fn update_ticket(&self, id: i64, changes: &TicketChanges) -> DeskResult<Ticket> {
        self.ensure_open_ticket(id)?;
        if let Some(Some(category_id)) = changes.category_id {
            self.ensure_usable("ticket_categories", category_id, "category_id", "category")?;
        }
        if let Some(tag_ids) = &changes.tag_ids {
            self.ensure_usable_tags(tag_ids)?;
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(subject) = &changes.subject {
            tx.execute(
                "UPDATE tickets SET subject = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![subject, id],
            )
            .context("Failed to update ticket subject")?;
        }
        if let Some(description) = &changes.description {
            tx.execute(
                "UPDATE tickets SET description = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![description, id],
            )
            .context("Failed to update ticket description")?;
        }
        if let Some(status) = &changes.status {
            tx.execute(
                "UPDATE tickets SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![status.as_str(), id],
            )
            .context("Failed to update ticket status")?;
        }
        if let Some(priority) = &changes.priority {
            tx.execute(
                "UPDATE tickets SET priority = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![priority.as_str(), id],
            )
            .context("Failed to update ticket priority")?;
        }
        if let Some(category_id) = &changes.category_id {
            tx.execute(
                "UPDATE tickets SET category_id = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![category_id, id],
            )
            .context("Failed to update ticket category")?;
        }
        if let Some(tag_ids) = &changes.tag_ids {
            tx.execute("DELETE FROM ticket_tag_links WHERE ticket_id = ?1", params![id])
                .context("Failed to clear ticket tags")?;
            self.link_tags(id, tag_ids)?;
            tx.execute(
                "UPDATE tickets SET updated_at = datetime('now') WHERE id = ?1",
                params![id],
            )
            .context("Failed to touch ticket")?;
        }
        tx.commit().context("Failed to commit ticket update")?;

        Ok(self.get_ticket(id)?.context("Ticket not found after update")?)
    }

    pub fn set_ticket_archived(&self, id: i64, archived: bool) -> DeskResult<Ticket> {
        let already = if archived {
            "Ticket is already archived"
        } else {
            "Ticket is not archived"
        };
        self.set_flag("tickets", "Ticket", id, "is_archived", archived, already)?;
        Ok(self.get_ticket(id)?.context("Ticket not found after archive toggle")?)
    }

    /// Assign an active admin to a ticket.
    pub fn assign_ticket(
        &self,
        ticket_id: i64,
        admin_id: i64,
        assigned_by: Option<i64>,
    ) -> DeskResult<Ticket> {
        self.ensure_open_ticket(ticket_id)?;
        if self.flag("admins", admin_id, "is_active")? != Some(true) {
            return Err(DeskError::invalid_field(
                "admin_id",
                "The selected admin is invalid",
            ));
        }
        let already: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM ticket_assignments WHERE ticket_id = ?1 AND admin_id = ?2",
                params![ticket_id, admin_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to check existing assignment")?;
        if already.is_some() {
            return Err(DeskError::Conflict(
                "Admin is already assigned to this ticket".to_string(),
            ));
        }

        self.conn
            .execute(
                "INSERT INTO ticket_assignments (ticket_id, admin_id, assigned_by) VALUES (?1, ?2, ?3)",
                params![ticket_id, admin_id, assigned_by],
            )
            .context("Failed to insert assignment")?;
        self.touch_ticket(ticket_id)?;
        Ok(self.get_ticket(ticket_id)?.context("Ticket not found after assignment")?)
    }

    pub fn unassign_ticket(&self, ticket_id: i64, assignment_id: i64) -> DeskResult<Ticket> {
        self.ensure_open_ticket(ticket_id)?;
        let removed = self
            .conn
            .execute(
                "DELETE FROM ticket_assignments WHERE id = ?1 AND ticket_id = ?2",
                params![assignment_id, ticket_id],
            )
            .context("Failed to delete assignment")?;
        if removed == 0 {
            return Err(DeskError::not_found("Assignment", assignment_id));
        }
        self.touch_ticket(ticket_id)?;
        Ok(self.get_ticket(ticket_id)?.context("Ticket not found after unassignment")?)
    }

    // ── Internals ─────────────────────────────────────────────────────

    fn ensure_open_ticket(&self, id: i64) -> DeskResult<()> {
        match self.flag("tickets", id, "is_archived")? {
            None => Err(DeskError::not_found("Ticket", id)),
            Some(true) => Err(DeskError::Conflict(ARCHIVED_TICKET.to_string())),
            Some(false) => Ok(()),
        }
    }

    fn ensure_usable_tags(&self, tag_ids: &[i64]) -> DeskResult<()> {
        for tag_id in tag_ids {
            self.ensure_usable("ticket_tags", *tag_id, "tag_ids", "tag")?;
        }
        Ok(())
    }

    fn link_tags(&self, ticket_id: i64, tag_ids: &[i64]) -> DeskResult<()> {
        for tag_id in tag_ids {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO ticket_tag_links (ticket_id, tag_id) VALUES (?1, ?2)",
                    params![ticket_id, tag_id],
                )
                .context("Failed to link ticket tag")?;
        }
        Ok(())
    }

    fn touch_ticket(&self, id: i64) -> DeskResult<()> {
        self.conn
            .execute(
                "UPDATE tickets SET updated_at = datetime('now') WHERE id = ?1",
                params![id],
            )
            .context("Failed to touch ticket")?;
        Ok(())
    }

    fn hydrate_ticket(&self, ticket: &mut Ticket) -> DeskResult<()> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT tg.id, tg.name FROM ticket_tag_links l
                 JOIN ticket_tags tg ON tg.id = l.tag_id
                 WHERE l.ticket_id = ?1 ORDER BY tg.name",
            )
            .context("Failed to prepare ticket tags query")?;
        let tags = stmt
            .query_map(params![ticket.id], |row| {
                Ok(RecordRef {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .context("Failed to query ticket tags")?;
        ticket.tags = tags
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read ticket tags")?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT a.id, a.ticket_id, a.admin_id, ad.name, a.assigned_by, a.created_at
                 FROM ticket_assignments a
                 JOIN admins ad ON ad.id = a.admin_id
                 WHERE a.ticket_id = ?1 ORDER BY a.id",
            )
            .context("Failed to prepare assignments query")?;
        let assignments = stmt
            .query_map(params![ticket.id], |row| {
                Ok(TicketAssignment {
                    id: row.get(0)?,
                    ticket_id: row.get(1)?,
                    admin: RecordRef {
                        id: row.get(2)?,
                        name: row.get(3)?,
                    },
                    assigned_by: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .context("Failed to query assignments")?;
        ticket.assignments = assignments
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read assignments")?;
        Ok(())
    }
}
