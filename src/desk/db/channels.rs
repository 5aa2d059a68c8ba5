use anyhow::Context;
use helpdesk_common::models::Channel;
use helpdesk_common::{Page, PageRequest};
use rusqlite::{OptionalExtension, Row, params};

use super::query::{ArchiveFilter, Sort};
use super::DeskDb;
use crate::errors::{DeskError, DeskResult};

const COLUMNS: &str = "id, name, description, is_archived, created_at, updated_at";
const DUPLICATE_NAME: &str = "Channel with this name already exists";

fn read_channel(row: &Row<'_>) -> rusqlite::Result<Channel> {
    Ok(Channel {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        is_archived: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[derive(Debug, Clone, Default)]
pub struct ChannelChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl DeskDb {
    pub fn create_channel(&self, name: &str, description: &str) -> DeskResult<Channel> {
        self.ensure_unique("channels", "name", name, None, DUPLICATE_NAME)?;
        self.conn
            .execute(
                "INSERT INTO channels (name, description) VALUES (?1, ?2)",
                params![name, description],
            )
            .context("Failed to insert channel")?;
        let id = self.conn.last_insert_rowid();
        Ok(self.get_channel(id)?.context("Channel not found after insert")?)
    }

    pub fn get_channel(&self, id: i64) -> DeskResult<Option<Channel>> {
        let channel = self
            .conn
            .query_row(
                &format!("SELECT {} FROM channels WHERE id = ?1", COLUMNS),
                params![id],
                read_channel,
            )
            .optional()
            .context("Failed to query channel")?;
        Ok(channel)
    }

    pub fn list_channels(
        &self,
        filter: &ArchiveFilter,
        sort: Sort,
        page: PageRequest,
    ) -> DeskResult<Page<Channel>> {
        let filter = filter.to_list_filter(&["name", "description"]);
        self.fetch_page("channels", COLUMNS, &filter, sort, page, read_channel)
    }

    pub fn update_channel(&self, id: i64, changes: &ChannelChanges) -> DeskResult<Channel> {
        if !self.exists("channels", id)? {
            return Err(DeskError::not_found("Channel", id));
        }
        if let Some(name) = &changes.name {
            self.ensure_unique("channels", "name", name, Some(id), DUPLICATE_NAME)?;
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(name) = &changes.name {
            tx.execute(
                "UPDATE channels SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![name, id],
            )
            .context("Failed to update channel name")?;
        }
        if let Some(description) = &changes.description {
            tx.execute(
                "UPDATE channels SET description = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![description, id],
            )
            .context("Failed to update channel description")?;
        }
        tx.commit().context("Failed to commit channel update")?;

        Ok(self.get_channel(id)?.context("Channel not found after update")?)
    }

    pub fn set_channel_archived(&self, id: i64, archived: bool) -> DeskResult<Channel> {
        let already = if archived {
            "Channel is already archived"
        } else {
            "Channel is not archived"
        };
        self.set_flag("channels", "Channel", id, "is_archived", archived, already)?;
        Ok(self.get_channel(id)?.context("Channel not found after archive toggle")?)
    }
}
