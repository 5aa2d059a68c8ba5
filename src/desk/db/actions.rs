//! Configurable actions and the custom input fields attached to them.

use anyhow::Context;
use helpdesk_common::models::{Action, ActionField, ActionFieldType, RecordRef};
use helpdesk_common::{Page, PageRequest};
use rusqlite::{OptionalExtension, Row, params};

use super::query::{ListFilter, Sort};
use super::{DeskDb, parse_column};
use crate::desk::validate;
use crate::errors::{DeskError, DeskResult};

const FROM: &str = "actions a LEFT JOIN channels ch ON ch.id = a.channel_id";
const COLUMNS: &str =
    "a.id, a.name, a.description, a.channel_id, ch.name, a.is_enabled, a.is_archived, a.created_at, a.updated_at";
const FIELD_COLUMNS: &str = "id, action_id, name, label, field_type, is_required, options, position";
const DUPLICATE_NAME: &str = "Action with this name already exists";

fn read_action(row: &Row<'_>) -> rusqlite::Result<Action> {
    let channel = match row.get::<_, Option<i64>>(3)? {
        Some(id) => Some(RecordRef {
            id,
            name: row.get(4)?,
        }),
        None => None,
    };
    Ok(Action {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        channel,
        is_enabled: row.get(5)?,
        is_archived: row.get(6)?,
        fields: Vec::new(),
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn read_field(row: &Row<'_>) -> rusqlite::Result<ActionField> {
    let options: String = row.get(6)?;
    let options: Vec<String> = serde_json::from_str(&options).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ActionField {
        id: row.get(0)?,
        action_id: row.get(1)?,
        name: row.get(2)?,
        label: row.get(3)?,
        field_type: parse_column(row, 4)?,
        is_required: row.get(5)?,
        options,
        position: row.get(7)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewActionField {
    pub name: String,
    pub label: String,
    pub field_type: ActionFieldType,
    pub is_required: bool,
    pub options: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewAction {
    pub name: String,
    pub description: String,
    pub channel_id: Option<i64>,
    pub fields: Vec<NewActionField>,
}

#[derive(Debug, Clone, Default)]
pub struct ActionChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` detaches the action from its channel
    pub channel_id: Option<Option<i64>>,
    /// Replaces every field when present
    pub fields: Option<Vec<NewActionField>>,
}

#[derive(Debug, Clone, Default)]
pub struct ActionFilter {
    pub search: Option<String>,
    pub is_archived: bool,
    pub is_enabled: Option<bool>,
    pub channel_id: Option<i64>,
}

impl DeskDb {
    pub fn create_action(&self, action: &NewAction) -> DeskResult<Action> {
        self.ensure_unique("actions", "name", &action.name, None, DUPLICATE_NAME)?;
        if let Some(channel_id) = action.channel_id {
            self.ensure_usable("channels", channel_id, "channel_id", "channel")?;
        }
        validate::action_fields(&action.fields)?;

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        tx.execute(
            "INSERT INTO actions (name, description, channel_id) VALUES (?1, ?2, ?3)",
            params![action.name, action.description, action.channel_id],
        )
        .context("Failed to insert action")?;
        let id = tx.last_insert_rowid();
        self.insert_fields(id, &action.fields)?;
        tx.commit().context("Failed to commit action insert")?;

        Ok(self.get_action(id)?.context("Action not found after insert")?)
    }

    pub fn get_action(&self, id: i64) -> DeskResult<Option<Action>> {
        let action = self
            .conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE a.id = ?1", COLUMNS, FROM),
                params![id],
                read_action,
            )
            .optional()
            .context("Failed to query action")?;
        match action {
            Some(mut action) => {
                action.fields = self.fields_of(action.id)?;
                Ok(Some(action))
            }
            None => Ok(None),
        }
    }

    pub fn list_actions(
        &self,
        filter: &ActionFilter,
        sort: Sort,
        page: PageRequest,
    ) -> DeskResult<Page<Action>> {
        let mut where_ = ListFilter::new();
        where_
            .search(&["a.name", "a.description"], filter.search.as_deref())
            .eq_bool("a.is_archived", Some(filter.is_archived))
            .eq_bool("a.is_enabled", filter.is_enabled)
            .eq_int("a.channel_id", filter.channel_id);
        let mut page = self.fetch_page(FROM, COLUMNS, &where_, sort, page, read_action)?;
        for action in &mut page.items {
            action.fields = self.fields_of(action.id)?;
        }
        Ok(page)
    }

    pub fn update_action(&self, id: i64, changes: &ActionChanges) -> DeskResult<Action> {
        if !self.exists("actions", id)? {
            return Err(DeskError::not_found("Action", id));
        }
        if let Some(name) = &changes.name {
            self.ensure_unique("actions", "name", name, Some(id), DUPLICATE_NAME)?;
        }
        if let Some(Some(channel_id)) = changes.channel_id {
            self.ensure_usable("channels", channel_id, "channel_id", "channel")?;
        }
        if let Some(fields) = &changes.fields {
            validate::action_fields(fields)?;
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(name) = &changes.name {
            tx.execute(
                "UPDATE actions SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![name, id],
            )
            .context("Failed to update action name")?;
        }
        if let Some(description) = &changes.description {
            tx.execute(
                "UPDATE actions SET description = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![description, id],
            )
            .context("Failed to update action description")?;
        }
        if let Some(channel_id) = &changes.channel_id {
            tx.execute(
                "UPDATE actions SET channel_id = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![channel_id, id],
            )
            .context("Failed to update action channel")?;
        }
        if let Some(fields) = &changes.fields {
            tx.execute("DELETE FROM action_fields WHERE action_id = ?1", params![id])
                .context("Failed to clear action fields")?;
            self.insert_fields(id, fields)?;
            tx.execute(
                "UPDATE actions SET updated_at = datetime('now') WHERE id = ?1",
                params![id],
            )
            .context("Failed to touch action")?;
        }
        tx.commit().context("Failed to commit action update")?;

        Ok(self.get_action(id)?.context("Action not found after update")?)
    }

    pub fn set_action_enabled(&self, id: i64, enabled: bool) -> DeskResult<Action> {
        let already = if enabled {
            "Action is already enabled"
        } else {
            "Action is already disabled"
        };
        self.set_flag("actions", "Action", id, "is_enabled", enabled, already)?;
        Ok(self.get_action(id)?.context("Action not found after toggle")?)
    }

    pub fn set_action_archived(&self, id: i64, archived: bool) -> DeskResult<Action> {
        let already = if archived {
            "Action is already archived"
        } else {
            "Action is not archived"
        };
        self.set_flag("actions", "Action", id, "is_archived", archived, already)?;
        Ok(self.get_action(id)?.context("Action not found after archive toggle")?)
    }

    /// Fields of an action in display order; `NotFound` for an unknown action.
    pub fn list_action_fields(&self, action_id: i64) -> DeskResult<Vec<ActionField>> {
        if !self.exists("actions", action_id)? {
            return Err(DeskError::not_found("Action", action_id));
        }
        self.fields_of(action_id)
    }

    fn fields_of(&self, action_id: i64) -> DeskResult<Vec<ActionField>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {} FROM action_fields WHERE action_id = ?1 ORDER BY position, id",
                FIELD_COLUMNS
            ))
            .context("Failed to prepare action fields query")?;
        let rows = stmt
            .query_map(params![action_id], read_field)
            .context("Failed to query action fields")?;
        let fields = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read action fields")?;
        Ok(fields)
    }

    fn insert_fields(&self, action_id: i64, fields: &[NewActionField]) -> DeskResult<()> {
        for (position, field) in fields.iter().enumerate() {
            let options =
                serde_json::to_string(&field.options).context("Failed to encode field options")?;
            self.conn
                .execute(
                    "INSERT INTO action_fields (action_id, name, label, field_type, is_required, options, position)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        action_id,
                        field.name,
                        field.label,
                        field.field_type.as_str(),
                        field.is_required,
                        options,
                        position as i64,
                    ],
                )
                .context("Failed to insert action field")?;
        }
        Ok(())
    }
}
