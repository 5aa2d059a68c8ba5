//! Project initialization - `helpdesk init`.

use anyhow::{Context, Result};

use helpdesk::config::{HelpdeskConfig, HelpdeskToml};
use helpdesk::desk::server::open_database;

pub fn cmd_init(config: &HelpdeskConfig) -> Result<()> {
    std::fs::create_dir_all(&config.config_dir)
        .with_context(|| format!("Failed to create {}", config.config_dir.display()))?;

    let config_file = config.config_file();
    if config_file.exists() {
        println!("Config already present at {}", config_file.display());
    } else {
        HelpdeskToml::default().save(&config_file)?;
        println!("Created {}", config_file.display());
    }

    let db_path = config.db_path();
    open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database initialized");
    println!("Database ready at {}", db_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Run `helpdesk create-admin` to add the first super admin");
    println!("  2. Run `helpdesk serve` to start the API");

    Ok(())
}
