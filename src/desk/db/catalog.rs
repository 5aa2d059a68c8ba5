//! Ticket categories and ticket tags: the two lookup tables used to
//! classify tickets.

use anyhow::Context;
use helpdesk_common::models::{TicketCategory, TicketTag};
use helpdesk_common::{Page, PageRequest};
use rusqlite::{OptionalExtension, Row, params};

use super::query::{ArchiveFilter, Sort};
use super::DeskDb;
use crate::errors::{DeskError, DeskResult};

const CATEGORY_COLUMNS: &str = "id, name, description, is_archived, created_at, updated_at";
const TAG_COLUMNS: &str = "id, name, color, is_archived, created_at, updated_at";
const DUPLICATE_CATEGORY: &str = "Ticket category with this name already exists";
const DUPLICATE_TAG: &str = "Ticket tag with this name already exists";

fn read_category(row: &Row<'_>) -> rusqlite::Result<TicketCategory> {
    Ok(TicketCategory {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_archived: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn read_tag(row: &Row<'_>) -> rusqlite::Result<TicketTag> {
    Ok(TicketTag {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        is_archived: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[derive(Debug, Clone, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TagChanges {
    pub name: Option<String>,
    /// `Some(None)` clears the color
    pub color: Option<Option<String>>,
}

impl DeskDb {
    // ── Categories ────────────────────────────────────────────────────

    pub fn create_category(&self, name: &str, description: &str) -> DeskResult<TicketCategory> {
        self.ensure_unique("ticket_categories", "name", name, None, DUPLICATE_CATEGORY)?;
        self.conn
            .execute(
                "INSERT INTO ticket_categories (name, description) VALUES (?1, ?2)",
                params![name, description],
            )
            .context("Failed to insert ticket category")?;
        let id = self.conn.last_insert_rowid();
        Ok(self.get_category(id)?.context("Category not found after insert")?)
    }

    pub fn get_category(&self, id: i64) -> DeskResult<Option<TicketCategory>> {
        let category = self
            .conn
            .query_row(
                &format!("SELECT {} FROM ticket_categories WHERE id = ?1", CATEGORY_COLUMNS),
                params![id],
                read_category,
            )
            .optional()
            .context("Failed to query ticket category")?;
        Ok(category)
    }

    pub fn list_categories(
        &self,
        filter: &ArchiveFilter,
        sort: Sort,
        page: PageRequest,
    ) -> DeskResult<Page<TicketCategory>> {
        self.fetch_page(
            "ticket_categories",
            CATEGORY_COLUMNS,
            &filter.to_list_filter(&["name", "description"]),
            sort,
            page,
            read_category,
        )
    }

    pub fn update_category(
        &self,
        id: i64,
        changes: &CategoryChanges,
    ) -> DeskResult<TicketCategory> {
        if !self.exists("ticket_categories", id)? {
            return Err(DeskError::not_found("Ticket category", id));
        }
        if let Some(name) = &changes.name {
            self.ensure_unique("ticket_categories", "name", name, Some(id), DUPLICATE_CATEGORY)?;
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(name) = &changes.name {
            tx.execute(
                "UPDATE ticket_categories SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![name, id],
            )
            .context("Failed to update category name")?;
        }
        if let Some(description) = &changes.description {
            tx.execute(
                "UPDATE ticket_categories SET description = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![description, id],
            )
            .context("Failed to update category description")?;
        }
        tx.commit().context("Failed to commit category update")?;

        Ok(self.get_category(id)?.context("Category not found after update")?)
    }

    pub fn set_category_archived(&self, id: i64, archived: bool) -> DeskResult<TicketCategory> {
        let already = if archived {
            "Ticket category is already archived"
        } else {
            "Ticket category is not archived"
        };
        self.set_flag(
            "ticket_categories",
            "Ticket category",
            id,
            "is_archived",
            archived,
            already,
        )?;
        Ok(self.get_category(id)?.context("Category not found after archive toggle")?)
    }

    // ── Tags ──────────────────────────────────────────────────────────

    pub fn create_tag(&self, name: &str, color: Option<&str>) -> DeskResult<TicketTag> {
        self.ensure_unique("ticket_tags", "name", name, None, DUPLICATE_TAG)?;
        self.conn
            .execute(
                "INSERT INTO ticket_tags (name, color) VALUES (?1, ?2)",
                params![name, color],
            )
            .context("Failed to insert ticket tag")?;
        let id = self.conn.last_insert_rowid();
        Ok(self.get_tag(id)?.context("Tag not found after insert")?)
    }

    pub fn get_tag(&self, id: i64) -> DeskResult<Option<TicketTag>> {
        let tag = self
            .conn
            .query_row(
                &format!("SELECT {} FROM ticket_tags WHERE id = ?1", TAG_COLUMNS),
                params![id],
                read_tag,
            )
            .optional()
            .context("Failed to query ticket tag")?;
        Ok(tag)
    }

    pub fn list_tags(
        &self,
        filter: &ArchiveFilter,
        sort: Sort,
        page: PageRequest,
    ) -> DeskResult<Page<TicketTag>> {
        self.fetch_page(
            "ticket_tags",
            TAG_COLUMNS,
            &filter.to_list_filter(&["name"]),
            sort,
            page,
            read_tag,
        )
    }

    pub fn update_tag(&self, id: i64, changes: &TagChanges) -> DeskResult<TicketTag> {
        if !self.exists("ticket_tags", id)? {
            return Err(DeskError::not_found("Ticket tag", id));
        }
        if let Some(name) = &changes.name {
            self.ensure_unique("ticket_tags", "name", name, Some(id), DUPLICATE_TAG)?;
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(name) = &changes.name {
            tx.execute(
                "UPDATE ticket_tags SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![name, id],
            )
            .context("Failed to update tag name")?;
        }
        if let Some(color) = &changes.color {
            tx.execute(
                "UPDATE ticket_tags SET color = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![color, id],
            )
            .context("Failed to update tag color")?;
        }
        tx.commit().context("Failed to commit tag update")?;

        Ok(self.get_tag(id)?.context("Tag not found after update")?)
    }

    pub fn set_tag_archived(&self, id: i64, archived: bool) -> DeskResult<TicketTag> {
        let already = if archived {
            "Ticket tag is already archived"
        } else {
            "Ticket tag is not archived"
        };
        self.set_flag("ticket_tags", "Ticket tag", id, "is_archived", archived, already)?;
        Ok(self.get_tag(id)?.context("Tag not found after archive toggle")?)
    }
}
