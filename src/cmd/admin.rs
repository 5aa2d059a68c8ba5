//! Admin bootstrap - `helpdesk create-admin`.

use anyhow::{Context, Result};
use helpdesk_common::models::AdminRole;

use helpdesk::config::HelpdeskConfig;
use helpdesk::desk::auth::hash_password;
use helpdesk::desk::db::NewAdmin;
use helpdesk::desk::server::open_database;
use helpdesk::desk::validate::Checks;

pub fn cmd_create_admin(
    config: &HelpdeskConfig,
    name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> Result<()> {
    let role: AdminRole = role.parse().map_err(anyhow::Error::msg)?;

    let mut checks = Checks::new();
    checks
        .required("name", name)
        .required("email", email)
        .email("email", email)
        .password("password", password);
    checks.finish()?;

    let db = open_database(&config.db_path())?;
    let admin = db
        .create_admin(&NewAdmin {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            password_hash: hash_password(password)?,
            role,
        })
        .context("Failed to create admin")?;

    tracing::info!(admin_id = admin.id, role = role.as_str(), "admin created from CLI");
    println!(
        "Created {} '{}' <{}> (id {})",
        role.as_str(),
        admin.name,
        admin.email,
        admin.id
    );
    Ok(())
}
