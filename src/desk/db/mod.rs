//! SQLite storage for the help-desk back-end.
//!
//! One `impl DeskDb` block per entity lives in the submodules; this module
//! owns the connection, the migrations and the helpers they share.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{DeskError, DeskResult};

mod actions;
mod admins;
mod catalog;
mod channels;
mod clients;
pub mod query;
mod sessions;
mod tickets;

pub use actions::{ActionChanges, ActionFilter, NewAction, NewActionField};
pub use admins::{AdminChanges, AdminFilter, NewAdmin};
pub use catalog::{CategoryChanges, TagChanges};
pub use channels::ChannelChanges;
pub use clients::{ClientChanges, NewClient};
pub use query::{ArchiveFilter, ListFilter, Sort, SortOrder};
pub use tickets::{NewTicket, TicketChanges, TicketFilter};

/// Async-safe handle to the help-desk database.
///
/// Wraps `DeskDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O
/// never ties up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<DeskDb>>,
}

impl DbHandle {
    pub fn new(db: DeskDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> DeskResult<R>
    where
        F: FnOnce(&DeskDb) -> DeskResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| DeskError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. Only for startup and tests.
    pub fn lock_sync(&self) -> DeskResult<std::sync::MutexGuard<'_, DeskDb>> {
        self.inner.lock().map_err(|_| DeskError::LockPoisoned)
    }
}

pub struct DeskDb {
    conn: Connection,
}

impl DeskDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS admins (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    password_hash TEXT NOT NULL,
                    role TEXT NOT NULL DEFAULT 'operator',
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS sessions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    token_hash TEXT NOT NULL UNIQUE,
                    admin_id INTEGER NOT NULL REFERENCES admins(id) ON DELETE CASCADE,
                    expires_at INTEGER NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS clients (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    phone TEXT,
                    is_archived INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS channels (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    description TEXT NOT NULL DEFAULT '',
                    is_archived INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS ticket_categories (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    description TEXT NOT NULL DEFAULT '',
                    is_archived INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS ticket_tags (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    color TEXT,
                    is_archived INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS tickets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    subject TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    status TEXT NOT NULL DEFAULT 'open',
                    priority TEXT NOT NULL DEFAULT 'medium',
                    client_id INTEGER NOT NULL REFERENCES clients(id),
                    channel_id INTEGER NOT NULL REFERENCES channels(id),
                    category_id INTEGER REFERENCES ticket_categories(id),
                    is_archived INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS ticket_tag_links (
                    ticket_id INTEGER NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
                    tag_id INTEGER NOT NULL REFERENCES ticket_tags(id),
                    PRIMARY KEY (ticket_id, tag_id)
                );

                CREATE TABLE IF NOT EXISTS ticket_assignments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ticket_id INTEGER NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
                    admin_id INTEGER NOT NULL REFERENCES admins(id),
                    assigned_by INTEGER REFERENCES admins(id),
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    UNIQUE(ticket_id, admin_id)
                );

                CREATE TABLE IF NOT EXISTS actions (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
                    description TEXT NOT NULL DEFAULT '',
                    channel_id INTEGER REFERENCES channels(id),
                    is_enabled INTEGER NOT NULL DEFAULT 1,
                    is_archived INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS action_fields (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    action_id INTEGER NOT NULL REFERENCES actions(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    label TEXT NOT NULL,
                    field_type TEXT NOT NULL DEFAULT 'text',
                    is_required INTEGER NOT NULL DEFAULT 0,
                    options TEXT NOT NULL DEFAULT '[]',
                    position INTEGER NOT NULL DEFAULT 0,
                    UNIQUE(action_id, name)
                );

                CREATE INDEX IF NOT EXISTS idx_sessions_admin ON sessions(admin_id);
                CREATE INDEX IF NOT EXISTS idx_tickets_client ON tickets(client_id);
                CREATE INDEX IF NOT EXISTS idx_tickets_channel ON tickets(channel_id);
                CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
                CREATE INDEX IF NOT EXISTS idx_assignments_admin ON ticket_assignments(admin_id);
                CREATE INDEX IF NOT EXISTS idx_action_fields_action ON action_fields(action_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Shared helpers ────────────────────────────────────────────────

    /// Whether a row with `id` exists in `table`.
    pub(crate) fn exists(&self, table: &str, id: i64) -> DeskResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                &format!("SELECT id FROM {} WHERE id = ?1", table),
                params![id],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to look up {} {}", table, id))?;
        Ok(found.is_some())
    }

    /// Read a boolean status column (`is_archived`, `is_enabled`, ...).
    pub(crate) fn flag(&self, table: &str, id: i64, column: &str) -> DeskResult<Option<bool>> {
        let value = self
            .conn
            .query_row(
                &format!("SELECT {} FROM {} WHERE id = ?1", column, table),
                params![id],
                |row| row.get::<_, bool>(0),
            )
            .optional()
            .with_context(|| format!("Failed to read {}.{}", table, column))?;
        Ok(value)
    }

    /// Flip a boolean status column, refusing no-op transitions.
    ///
    /// Returns `NotFound` for a missing row and `Conflict(already)` when the
    /// column already holds `value`.
    pub(crate) fn set_flag(
        &self,
        table: &str,
        entity: &'static str,
        id: i64,
        column: &str,
        value: bool,
        already: &str,
    ) -> DeskResult<()> {
        match self.flag(table, id, column)? {
            None => return Err(DeskError::not_found(entity, id)),
            Some(current) if current == value => {
                return Err(DeskError::Conflict(already.to_string()));
            }
            Some(_) => {}
        }
        self.conn
            .execute(
                &format!(
                    "UPDATE {} SET {} = ?1, updated_at = datetime('now') WHERE id = ?2",
                    table, column
                ),
                params![value, id],
            )
            .with_context(|| format!("Failed to update {}.{}", table, column))?;
        Ok(())
    }

    /// Fail with a 422 when another row of `table` already uses `value` in
    /// `column` (case-insensitive). `except_id` skips the row being updated.
    pub(crate) fn ensure_unique(
        &self,
        table: &str,
        column: &'static str,
        value: &str,
        except_id: Option<i64>,
        message: &str,
    ) -> DeskResult<()> {
        let taken: Option<i64> = self
            .conn
            .query_row(
                &format!(
                    "SELECT id FROM {} WHERE {} = ?1 COLLATE NOCASE AND id != ?2",
                    table, column
                ),
                params![value, except_id.unwrap_or(0)],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to check uniqueness of {}.{}", table, column))?;
        match taken {
            Some(_) => Err(DeskError::Duplicate {
                message: message.to_string(),
                field: column,
            }),
            None => Ok(()),
        }
    }

    /// Ensure `id` references a live (unarchived) row, or fail with a 400 on
    /// `field`.
    pub(crate) fn ensure_usable(
        &self,
        table: &str,
        id: i64,
        field: &str,
        label: &str,
    ) -> DeskResult<()> {
        match self.flag(table, id, "is_archived")? {
            Some(false) => Ok(()),
            _ => Err(DeskError::invalid_field(
                field,
                format!("The selected {} is invalid", label),
            )),
        }
    }
}

/// Parse a text column holding one of the `snake_case` model enums.
pub(crate) fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_database_and_run_migrations() -> anyhow::Result<()> {
        let db = DeskDb::new_in_memory()?;

        let table_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
             ('admins', 'sessions', 'clients', 'channels', 'ticket_categories', 'ticket_tags',
              'tickets', 'ticket_tag_links', 'ticket_assignments', 'actions', 'action_fields')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 11, "Expected all tables to exist");

        Ok(())
    }

    #[test]
    fn test_migrations_are_idempotent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("helpdesk.db");
        {
            let db = DeskDb::new(&path)?;
            db.create_channel("Email", "")?;
        }
        let reopened = DeskDb::new(&path)?;
        assert!(reopened.exists("channels", 1)?);
        Ok(())
    }

    #[test]
    fn test_set_flag_rejects_noop_and_missing() -> anyhow::Result<()> {
        let db = DeskDb::new_in_memory()?;
        let channel = db.create_channel("WhatsApp", "")?;

        let err = db
            .set_flag(
                "channels",
                "Channel",
                channel.id,
                "is_archived",
                false,
                "Channel is not archived",
            )
            .unwrap_err();
        assert!(matches!(err, DeskError::Conflict(_)));

        db.set_flag(
            "channels",
            "Channel",
            channel.id,
            "is_archived",
            true,
            "Channel is already archived",
        )?;
        assert_eq!(db.flag("channels", channel.id, "is_archived")?, Some(true));

        let err = db
            .set_flag("channels", "Channel", 999, "is_archived", true, "x")
            .unwrap_err();
        assert!(matches!(err, DeskError::NotFound { id: 999, .. }));
        Ok(())
    }

    #[test]
    fn test_ensure_unique_is_case_insensitive() -> anyhow::Result<()> {
        let db = DeskDb::new_in_memory()?;
        let channel = db.create_channel("Email", "")?;

        let err = db
            .ensure_unique(
                "channels",
                "name",
                "EMAIL",
                None,
                "Channel with this name already exists",
            )
            .unwrap_err();
        assert!(matches!(err, DeskError::Duplicate { field: "name", .. }));

        // The row being updated does not collide with itself
        db.ensure_unique("channels", "name", "email", Some(channel.id), "dup")?;
        Ok(())
    }
}
