//! Configuration view and validation commands - `helpdesk config`.

use anyhow::{Context, Result};

use super::super::ConfigCommands;
use helpdesk::config::HelpdeskConfig;

pub fn cmd_config(config: &HelpdeskConfig, command: Option<ConfigCommands>) -> Result<()> {
    let config_path = config.config_file();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Help Desk Configuration");
            println!("=======================");
            println!();
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No helpdesk.toml found at {}", config_path.display());
                println!("Using defaults. Run 'helpdesk init' to create one.");
            }
            println!();

            // Effective values, env overrides included
            let rendered =
                toml::to_string_pretty(&config.toml).context("Failed to render configuration")?;
            println!("{}", rendered.trim_end());
            println!();
            println!("Resolved paths:");
            println!("  database = {}", config.db_path().display());
            if let Some(dir) = config.log_dir() {
                println!("  logs     = {}", dir.display());
            }
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No helpdesk.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
    }

    Ok(())
}
