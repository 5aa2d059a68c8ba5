use anyhow::Context;
use helpdesk_common::models::Client;
use helpdesk_common::{Page, PageRequest};
use rusqlite::{OptionalExtension, Row, params};

use super::query::{ArchiveFilter, Sort};
use super::DeskDb;
use crate::errors::{DeskError, DeskResult};

const COLUMNS: &str = "id, name, email, phone, is_archived, created_at, updated_at";
const DUPLICATE_EMAIL: &str = "Client with this email already exists";

fn read_client(row: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        is_archived: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewClient {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ClientChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    /// `Some(None)` clears the phone number
    pub phone: Option<Option<String>>,
}

impl DeskDb {
    pub fn create_client(&self, client: &NewClient) -> DeskResult<Client> {
        self.ensure_unique("clients", "email", &client.email, None, DUPLICATE_EMAIL)?;
        self.conn
            .execute(
                "INSERT INTO clients (name, email, phone) VALUES (?1, ?2, ?3)",
                params![client.name, client.email, client.phone],
            )
            .context("Failed to insert client")?;
        let id = self.conn.last_insert_rowid();
        Ok(self.get_client(id)?.context("Client not found after insert")?)
    }

    pub fn get_client(&self, id: i64) -> DeskResult<Option<Client>> {
        let client = self
            .conn
            .query_row(
                &format!("SELECT {} FROM clients WHERE id = ?1", COLUMNS),
                params![id],
                read_client,
            )
            .optional()
            .context("Failed to query client")?;
        Ok(client)
    }

    pub fn list_clients(
        &self,
        filter: &ArchiveFilter,
        sort: Sort,
        page: PageRequest,
    ) -> DeskResult<Page<Client>> {
        let filter = filter.to_list_filter(&["name", "email", "phone"]);
        self.fetch_page("clients", COLUMNS, &filter, sort, page, read_client)
    }

    pub fn update_client(&self, id: i64, changes: &ClientChanges) -> DeskResult<Client> {
        if !self.exists("clients", id)? {
            return Err(DeskError::not_found("Client", id));
        }
        if let Some(email) = &changes.email {
            self.ensure_unique("clients", "email", email, Some(id), DUPLICATE_EMAIL)?;
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(name) = &changes.name {
            tx.execute(
                "UPDATE clients SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![name, id],
            )
            .context("Failed to update client name")?;
        }
        if let Some(email) = &changes.email {
            tx.execute(
                "UPDATE clients SET email = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![email, id],
            )
            .context("Failed to update client email")?;
        }
        if let Some(phone) = &changes.phone {
            tx.execute(
                "UPDATE clients SET phone = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![phone, id],
            )
            .context("Failed to update client phone")?;
        }
        tx.commit().context("Failed to commit client update")?;

        Ok(self.get_client(id)?.context("Client not found after update")?)
    }

    pub fn set_client_archived(&self, id: i64, archived: bool) -> DeskResult<Client> {
        let already = if archived {
            "Client is already archived"
        } else {
            "Client is not archived"
        };
        self.set_flag("clients", "Client", id, "is_archived", archived, already)?;
        Ok(self.get_client(id)?.context("Client not found after archive toggle")?)
    }
}
