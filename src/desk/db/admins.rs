use anyhow::Context;
use helpdesk_common::models::{Admin, AdminRole};
use helpdesk_common::{Page, PageRequest};
use rusqlite::{OptionalExtension, Row, params};

use super::query::{ListFilter, Sort};
use super::{DeskDb, parse_column};
use crate::errors::{DeskError, DeskResult};

const COLUMNS: &str = "id, name, email, role, is_active, created_at, updated_at";
const DUPLICATE_EMAIL: &str = "Admin with this email already exists";
const LAST_SUPER_ADMIN: &str = "The last active super admin cannot be deactivated or demoted";

fn read_admin(row: &Row<'_>) -> rusqlite::Result<Admin> {
    Ok(Admin {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        role: parse_column(row, 3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub name: String,
    pub email: String,
    /// Argon2 PHC string, never the plain password.
    pub password_hash: String,
    pub role: AdminRole,
}

#[derive(Debug, Clone, Default)]
pub struct AdminChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<AdminRole>,
}

#[derive(Debug, Clone, Default)]
pub struct AdminFilter {
    pub search: Option<String>,
    pub role: Option<AdminRole>,
    pub is_active: Option<bool>,
}

impl DeskDb {
    pub fn create_admin(&self, admin: &NewAdmin) -> DeskResult<Admin> {
        self.ensure_unique("admins", "email", &admin.email, None, DUPLICATE_EMAIL)?;
        self.conn
            .execute(
                "INSERT INTO admins (name, email, password_hash, role) VALUES (?1, ?2, ?3, ?4)",
                params![admin.name, admin.email, admin.password_hash, admin.role.as_str()],
            )
            .context("Failed to insert admin")?;
        let id = self.conn.last_insert_rowid();
        Ok(self.get_admin(id)?.context("Admin not found after insert")?)
    }

    pub fn get_admin(&self, id: i64) -> DeskResult<Option<Admin>> {
        let admin = self
            .conn
            .query_row(
                &format!("SELECT {} FROM admins WHERE id = ?1", COLUMNS),
                params![id],
                read_admin,
            )
            .optional()
            .context("Failed to query admin")?;
        Ok(admin)
    }

    /// Look up an admin by email together with the stored password hash.
    pub fn find_admin_credentials(&self, email: &str) -> DeskResult<Option<(Admin, String)>> {
        let found = self
            .conn
            .query_row(
                &format!(
                    "SELECT {}, password_hash FROM admins WHERE email = ?1 COLLATE NOCASE",
                    COLUMNS
                ),
                params![email],
                |row| Ok((read_admin(row)?, row.get::<_, String>(7)?)),
            )
            .optional()
            .context("Failed to query admin by email")?;
        Ok(found)
    }

    pub fn list_admins(
        &self,
        filter: &AdminFilter,
        sort: Sort,
        page: PageRequest,
    ) -> DeskResult<Page<Admin>> {
        let mut where_ = ListFilter::new();
        where_
            .search(&["name", "email"], filter.search.as_deref())
            .eq_text("role", filter.role.as_ref().map(AdminRole::as_str))
            .eq_bool("is_active", filter.is_active);
        self.fetch_page("admins", COLUMNS, &where_, sort, page, read_admin)
    }

    pub fn count_admins(&self) -> DeskResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM admins", [], |row| row.get(0))
            .context("Failed to count admins")?;
        Ok(count)
    }

    pub fn count_active_super_admins(&self) -> DeskResult<i64> {
        let count = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM admins WHERE role = 'super_admin' AND is_active = 1",
                [],
                |row| row.get(0),
            )
            .context("Failed to count super admins")?;
        Ok(count)
    }

    pub fn update_admin(&self, id: i64, changes: &AdminChanges) -> DeskResult<Admin> {
        let current = self
            .get_admin(id)?
            .ok_or_else(|| DeskError::not_found("Admin", id))?;
        if let Some(email) = &changes.email {
            self.ensure_unique("admins", "email", email, Some(id), DUPLICATE_EMAIL)?;
        }
        if changes.role == Some(AdminRole::Operator)
            && current.is_super_admin()
            && current.is_active
            && self.count_active_super_admins()? <= 1
        {
            return Err(DeskError::Conflict(LAST_SUPER_ADMIN.to_string()));
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(name) = &changes.name {
            tx.execute(
                "UPDATE admins SET name = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![name, id],
            )
            .context("Failed to update admin name")?;
        }
        if let Some(email) = &changes.email {
            tx.execute(
                "UPDATE admins SET email = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![email, id],
            )
            .context("Failed to update admin email")?;
        }
        if let Some(hash) = &changes.password_hash {
            tx.execute(
                "UPDATE admins SET password_hash = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![hash, id],
            )
            .context("Failed to update admin password")?;
        }
        if let Some(role) = &changes.role {
            tx.execute(
                "UPDATE admins SET role = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![role.as_str(), id],
            )
            .context("Failed to update admin role")?;
        }
        tx.commit().context("Failed to commit admin update")?;

        Ok(self.get_admin(id)?.context("Admin not found after update")?)
    }

    /// Activate or deactivate an admin. Deactivation also revokes every
    /// session the admin holds.
    pub fn set_admin_active(&self, id: i64, active: bool) -> DeskResult<Admin> {
        let current = self
            .get_admin(id)?
            .ok_or_else(|| DeskError::not_found("Admin", id))?;
        if !active
            && current.is_active
            && current.is_super_admin()
            && self.count_active_super_admins()? <= 1
        {
            return Err(DeskError::Conflict(LAST_SUPER_ADMIN.to_string()));
        }

        let already = if active {
            "Admin is already active"
        } else {
            "Admin is already inactive"
        };
        self.set_flag("admins", "Admin", id, "is_active", active, already)?;
        if !active {
            self.delete_sessions_for_admin(id)?;
        }
        Ok(self.get_admin(id)?.context("Admin not found after status change")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_admin(name: &str, email: &str, role: AdminRole) -> NewAdmin {
        NewAdmin {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role,
        }
    }

    #[test]
    fn test_create_admin_and_find_credentials() -> anyhow::Result<()> {
        let db = DeskDb::new_in_memory()?;
        let admin = db.create_admin(&new_admin("Root", "root@desk.test", AdminRole::SuperAdmin))?;
        assert!(admin.is_active);
        assert!(admin.is_super_admin());

        let (found, hash) = db
            .find_admin_credentials("ROOT@desk.test")?
            .expect("lookup should ignore case");
        assert_eq!(found.id, admin.id);
        assert_eq!(hash, "$argon2id$stub");
        assert!(db.find_admin_credentials("nobody@desk.test")?.is_none());
        Ok(())
    }

    #[test]
    fn test_duplicate_admin_email() -> anyhow::Result<()> {
        let db = DeskDb::new_in_memory()?;
        db.create_admin(&new_admin("A", "a@desk.test", AdminRole::Operator))?;
        let err = db
            .create_admin(&new_admin("B", "a@desk.test", AdminRole::Operator))
            .unwrap_err();
        assert_eq!(err.to_string(), "Admin with this email already exists");
        Ok(())
    }

    #[test]
    fn test_last_super_admin_is_protected() -> anyhow::Result<()> {
        let db = DeskDb::new_in_memory()?;
        let root = db.create_admin(&new_admin("Root", "root@desk.test", AdminRole::SuperAdmin))?;

        let err = db.set_admin_active(root.id, false).unwrap_err();
        assert!(matches!(err, DeskError::Conflict(_)));
        let err = db
            .update_admin(
                root.id,
                &AdminChanges {
                    role: Some(AdminRole::Operator),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, DeskError::Conflict(_)));

        db.create_admin(&new_admin("Second", "two@desk.test", AdminRole::SuperAdmin))?;
        let demoted = db.update_admin(
            root.id,
            &AdminChanges {
                role: Some(AdminRole::Operator),
                ..Default::default()
            },
        )?;
        assert_eq!(demoted.role, AdminRole::Operator);
        Ok(())
    }

    #[test]
    fn test_deactivate_revokes_sessions() -> anyhow::Result<()> {
        let db = DeskDb::new_in_memory()?;
        db.create_admin(&new_admin("Root", "root@desk.test", AdminRole::SuperAdmin))?;
        let op = db.create_admin(&new_admin("Op", "op@desk.test", AdminRole::Operator))?;
        db.create_session("hash-1", op.id, i64::MAX)?;

        let inactive = db.set_admin_active(op.id, false)?;
        assert!(!inactive.is_active);
        assert!(db.find_session_admin("hash-1", 0)?.is_none());

        let err = db.set_admin_active(op.id, false).unwrap_err();
        assert!(matches!(err, DeskError::Conflict(ref m) if m == "Admin is already inactive"));
        Ok(())
    }

    #[test]
    fn test_list_admins_filters_role() -> anyhow::Result<()> {
        let db = DeskDb::new_in_memory()?;
        db.create_admin(&new_admin("Root", "root@desk.test", AdminRole::SuperAdmin))?;
        db.create_admin(&new_admin("Op", "op@desk.test", AdminRole::Operator))?;

        let sort = Sort::resolve(None, None, &[("id", "id")])?;
        let page = db.list_admins(
            &AdminFilter {
                role: Some(AdminRole::Operator),
                ..Default::default()
            },
            sort,
            PageRequest::new(1, 10),
        )?;
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Op");
        assert_eq!(db.count_admins()?, 2);
        Ok(())
    }
}
