use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use helpdesk::config::{HelpdeskConfig, ServeOverrides};
use helpdesk::logging;

mod cmd;

#[derive(Parser)]
#[command(name = "helpdesk")]
#[command(version, about = "Help-desk administration back-end")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .helpdesk/ with a default helpdesk.toml and initialize the database
    Init,
    /// Run the REST API server
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to serve on
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (CORS permissive for a local dashboard dev server)
        #[arg(long)]
        dev: bool,
    },
    /// Create an admin account from the shell
    CreateAdmin {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, env = "HELPDESK_ADMIN_PASSWORD")]
        password: String,

        /// super_admin or operator
        #[arg(long, default_value = "super_admin")]
        role: String,
    },
    /// Show or validate the configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // `init` creates the project directory layout, so it runs before the
    // config is loaded from it.
    if let Commands::Init = cli.command {
        std::fs::create_dir_all(&project_dir)
            .with_context(|| format!("Failed to create {}", project_dir.display()))?;
    }

    let overrides = match &cli.command {
        Commands::Serve {
            host,
            port,
            db_path,
            dev,
        } => ServeOverrides {
            host: host.clone(),
            port: *port,
            db_path: db_path.clone(),
            dev_mode: *dev,
        },
        _ => ServeOverrides::default(),
    };
    let config = HelpdeskConfig::with_cli_args(project_dir, cli.verbose, overrides)?;
    let log_dir = config.log_dir();
    let _log_guard = logging::init_subscriber(
        config.verbose,
        &config.toml.logging,
        log_dir.as_deref(),
    )?;

    match &cli.command {
        Commands::Init => cmd::cmd_init(&config)?,
        Commands::Serve { .. } => cmd::cmd_serve(&config).await?,
        Commands::CreateAdmin {
            name,
            email,
            password,
            role,
        } => cmd::cmd_create_admin(&config, name, email, password, role)?,
        Commands::Config { command } => cmd::cmd_config(&config, command.clone())?,
    }

    Ok(())
}
