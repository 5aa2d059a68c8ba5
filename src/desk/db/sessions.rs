//! Login sessions. Only the SHA-256 digest of a session token is stored;
//! `expires_at` is a unix timestamp in seconds.

use anyhow::Context;
use helpdesk_common::models::Admin;
use rusqlite::{OptionalExtension, params};

use super::DeskDb;
use crate::errors::DeskResult;

impl DeskDb {
    pub fn create_session(
        &self,
        token_hash: &str,
        admin_id: i64,
        expires_at: i64,
    ) -> DeskResult<()> {
        self.conn
            .execute(
                "INSERT INTO sessions (token_hash, admin_id, expires_at) VALUES (?1, ?2, ?3)",
                params![token_hash, admin_id, expires_at],
            )
            .context("Failed to insert session")?;
        Ok(())
    }

    /// Resolve an unexpired session to its admin.
    pub fn find_session_admin(&self, token_hash: &str, now: i64) -> DeskResult<Option<Admin>> {
        let admin_id: Option<i64> = self
            .conn
            .query_row(
                "SELECT admin_id FROM sessions WHERE token_hash = ?1 AND expires_at > ?2",
                params![token_hash, now],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query session")?;
        match admin_id {
            Some(id) => self.get_admin(id),
            None => Ok(None),
        }
    }

    pub fn delete_session(&self, token_hash: &str) -> DeskResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])
            .context("Failed to delete session")?;
        Ok(removed > 0)
    }

    pub fn delete_sessions_for_admin(&self, admin_id: i64) -> DeskResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE admin_id = ?1", params![admin_id])
            .context("Failed to revoke admin sessions")?;
        Ok(removed)
    }

    pub fn purge_expired_sessions(&self, now: i64) -> DeskResult<usize> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])
            .context("Failed to purge expired sessions")?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk::db::NewAdmin;
    use helpdesk_common::models::AdminRole;

    fn seed_admin(db: &DeskDb) -> anyhow::Result<Admin> {
        Ok(db.create_admin(&NewAdmin {
            name: "Root".into(),
            email: "root@desk.test".into(),
            password_hash: "x".into(),
            role: AdminRole::SuperAdmin,
        })?)
    }

    #[test]
    fn test_session_lookup_respects_expiry() -> anyhow::Result<()> {
        let db = DeskDb::new_in_memory()?;
        let admin = seed_admin(&db)?;
        db.create_session("abc", admin.id, 1_000)?;

        let found = db.find_session_admin("abc", 999)?.expect("session is live");
        assert_eq!(found.id, admin.id);
        assert!(db.find_session_admin("abc", 1_000)?.is_none());
        assert!(db.find_session_admin("other", 0)?.is_none());
        Ok(())
    }

    #[test]
    fn test_purge_and_delete() -> anyhow::Result<()> {
        let db = DeskDb::new_in_memory()?;
        let admin = seed_admin(&db)?;
        db.create_session("old", admin.id, 10)?;
        db.create_session("new", admin.id, 100)?;

        assert_eq!(db.purge_expired_sessions(50)?, 1);
        assert!(db.delete_session("new")?);
        assert!(!db.delete_session("new")?);
        Ok(())
    }
}
